//! Shape-tree rewrite passes.
//!
//! Each pass takes a snapshot of candidate nodes up front and re-checks its
//! preconditions per visit, because earlier visits in the same pass may have
//! already restructured the tree.

use tracing::trace;

use crate::foundation::core::Affine;
use crate::graph::index::GraphIndex;
use crate::graph::{
    Easing, Graph, KeyFrameAnimation, KeyFrameValue, KeyFrames, NodeId, NodeKind,
};
use crate::optimize::bitset::{PropertyMask, node_property_mask};
use crate::optimize::rewrite::{
    brush_is_transparent, container_shapes_equivalent_modulo_children, elide_container_shape,
    is_live, propagate_descriptions, remove_shape_child, shape_scale_is_visibility_only,
    transfer_shape_properties,
};

fn live_container_shapes(graph: &Graph) -> Vec<NodeId> {
    graph
        .collect_live()
        .into_iter()
        .filter(|&id| matches!(graph.kind(id), NodeKind::ContainerShape(_)))
        .collect()
}

fn live_shape_owners(graph: &Graph) -> Vec<NodeId> {
    graph
        .collect_live()
        .into_iter()
        .filter(|&id| {
            matches!(
                graph.kind(id),
                NodeKind::ContainerShape(_) | NodeKind::ShapeVisual(_)
            )
        })
        .collect()
}

/// Remove sprite shapes that can never draw: both brushes transparent.
pub(crate) fn elide_transparent_sprite_shapes(graph: &mut Graph, index: &mut GraphIndex) -> bool {
    let mut progress = false;
    let sprites: Vec<NodeId> = graph
        .collect_live()
        .into_iter()
        .filter(|&id| matches!(graph.kind(id), NodeKind::SpriteShape(_)))
        .collect();

    for id in sprites {
        let NodeKind::SpriteShape(s) = graph.kind(id) else {
            continue;
        };
        if brush_is_transparent(graph, s.fill_brush) && brush_is_transparent(graph, s.stroke_brush)
            && remove_shape_child(graph, index, id)
        {
            trace!(node = id.0, "elided transparent sprite shape");
            progress = true;
        }
    }
    progress
}

/// Merge consecutive sibling container shapes that are equivalent modulo
/// children: their child lists concatenate under the first of the run.
pub(crate) fn coalesce_sibling_container_shapes(graph: &mut Graph, index: &mut GraphIndex) -> bool {
    let mut progress = false;

    for owner in live_shape_owners(graph) {
        if !is_live(graph, index, owner) {
            continue;
        }
        let list = match graph.kind(owner) {
            NodeKind::ContainerShape(c) => c.shapes.clone(),
            NodeKind::ShapeVisual(s) => s.shapes.clone(),
            _ => continue,
        };

        // Streaming fold over the sibling sequence: a run extends while each
        // next container matches the run head.
        let mut merges: Vec<(NodeId, NodeId)> = Vec::new();
        let mut run_head: Option<NodeId> = None;
        for &child in &list {
            match run_head {
                Some(head) if container_shapes_equivalent_modulo_children(graph, head, child) => {
                    merges.push((head, child));
                }
                _ => {
                    run_head = matches!(graph.kind(child), NodeKind::ContainerShape(_))
                        .then_some(child);
                }
            }
        }

        for (head, victim) in merges {
            let NodeKind::ContainerShape(v) = graph.kind(victim) else {
                continue;
            };
            let grandchildren = v.shapes.clone();
            if !remove_shape_child(graph, index, victim) {
                continue;
            }
            graph.child_shapes_mut(victim).clear();
            graph.child_shapes_mut(head).extend(grandchildren.iter().copied());
            for &gc in &grandchildren {
                index.set_parent(gc, Some(head));
            }
            propagate_descriptions(graph, victim, head);
            trace!(head = head.0, victim = victim.0, "coalesced sibling container shapes");
            progress = true;
        }
    }
    progress
}

/// Drop container shapes with no children, repeating until none remain
/// (removals can empty the next container up).
pub(crate) fn elide_empty_container_shapes(graph: &mut Graph, index: &mut GraphIndex) -> bool {
    let mut progress = false;
    loop {
        let mut changed = false;
        for id in live_container_shapes(graph) {
            let NodeKind::ContainerShape(c) = graph.kind(id) else {
                continue;
            };
            if c.shapes.is_empty() && remove_shape_child(graph, index, id) {
                trace!(node = id.0, "elided empty container shape");
                changed = true;
            }
        }
        progress |= changed;
        if !changed {
            break;
        }
    }
    progress
}

/// Splice out container shapes that set nothing at all.
pub(crate) fn elide_structural_container_shapes(graph: &mut Graph, index: &mut GraphIndex) -> bool {
    let mut progress = false;
    for id in live_container_shapes(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerShape(c) = graph.kind(id) else {
            continue;
        };
        if c.shapes.is_empty() {
            continue;
        }
        if !node_property_mask(graph, id).is_empty() {
            continue;
        }
        if !graph.properties(id).is_empty() || index.has_in_references(id) {
            continue;
        }
        if elide_container_shape(graph, index, id) {
            trace!(node = id.0, "elided structural container shape");
            progress = true;
        }
    }
    progress
}

/// A container carrying only a static `TransformMatrix` multiplies it into
/// each child's matrix slot and splices itself out. Blocked when any child
/// animates its own matrix.
pub(crate) fn push_container_shape_transforms_down(
    graph: &mut Graph,
    index: &mut GraphIndex,
) -> bool {
    let mut progress = false;
    for id in live_container_shapes(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerShape(c) = graph.kind(id) else {
            continue;
        };
        if c.shapes.is_empty() {
            continue;
        }
        let children = c.shapes.clone();
        if node_property_mask(graph, id) != PropertyMask::TRANSFORM_MATRIX
            || !graph.animators(id).is_empty()
        {
            continue;
        }
        let Some(matrix) = graph.shape_transform(id).transform_matrix else {
            continue;
        };
        if !graph.properties(id).is_empty() || index.has_in_references(id) {
            continue;
        }
        if children
            .iter()
            .any(|&child| graph.is_animated(child, "TransformMatrix"))
        {
            continue;
        }

        for &child in &children {
            let t = graph.shape_transform_mut(child);
            t.transform_matrix = Some(matrix * t.transform_matrix.unwrap_or(Affine::IDENTITY));
        }
        graph.shape_transform_mut(id).transform_matrix = None;
        if elide_container_shape(graph, index, id) {
            trace!(node = id.0, "pushed container transform down");
            progress = true;
        }
    }
    progress
}

/// A matrix-only container wrapping a single matrix-free, non-animated
/// container hands its matrix to the child and splices itself out.
pub(crate) fn coalesce_single_child_container_shapes(
    graph: &mut Graph,
    index: &mut GraphIndex,
) -> bool {
    let mut progress = false;
    for id in live_container_shapes(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerShape(c) = graph.kind(id) else {
            continue;
        };
        let &[child] = &c.shapes[..] else {
            continue;
        };
        if !matches!(graph.kind(child), NodeKind::ContainerShape(_)) {
            continue;
        }
        if node_property_mask(graph, id) != PropertyMask::TRANSFORM_MATRIX
            || !graph.animators(id).is_empty()
        {
            continue;
        }
        let Some(matrix) = graph.shape_transform(id).transform_matrix else {
            continue;
        };
        if node_property_mask(graph, child).intersects(PropertyMask::TRANSFORM_MATRIX)
            || !graph.animators(child).is_empty()
        {
            continue;
        }
        if !graph.properties(id).is_empty() || index.has_in_references(id) {
            continue;
        }

        graph.shape_transform_mut(child).transform_matrix = Some(matrix);
        graph.shape_transform_mut(id).transform_matrix = None;
        if elide_container_shape(graph, index, id) {
            trace!(node = id.0, child = child.0, "coalesced single-child containers");
            progress = true;
        }
    }
    progress
}

/// A container wrapping a single property-free sprite shape moves all of its
/// transform slots and animators onto the sprite and splices itself out.
pub(crate) fn push_properties_down_to_sprite_shape(
    graph: &mut Graph,
    index: &mut GraphIndex,
) -> bool {
    let mut progress = false;
    for id in live_container_shapes(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerShape(c) = graph.kind(id) else {
            continue;
        };
        let &[child] = &c.shapes[..] else {
            continue;
        };
        if !matches!(graph.kind(child), NodeKind::SpriteShape(_)) {
            continue;
        }
        if !node_property_mask(graph, child).is_empty() {
            continue;
        }
        if !graph.properties(id).is_empty() || index.has_in_references(id) {
            continue;
        }

        transfer_shape_properties(graph, id, child);
        if elide_container_shape(graph, index, id) {
            trace!(node = id.0, sprite = child.0, "pushed properties down to sprite");
            progress = true;
        }
    }
    progress
}

/// A container whose only set property is a visibility-encoding `Scale`
/// moves that scale (and its animator) onto its single child.
pub(crate) fn push_shape_visibility_down(graph: &mut Graph, index: &mut GraphIndex) -> bool {
    let mut progress = false;
    for id in live_container_shapes(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerShape(c) = graph.kind(id) else {
            continue;
        };
        let &[child] = &c.shapes[..] else {
            continue;
        };
        if node_property_mask(graph, id) != PropertyMask::SCALE {
            continue;
        }
        if !shape_scale_is_visibility_only(graph, id) {
            continue;
        }
        if node_property_mask(graph, child).intersects(PropertyMask::SCALE) {
            continue;
        }
        if !graph.properties(id).is_empty() || index.has_in_references(id) {
            continue;
        }

        transfer_shape_properties(graph, id, child);
        if elide_container_shape(graph, index, id) {
            trace!(node = id.0, child = child.0, "pushed shape visibility down");
            progress = true;
        }
    }
    progress
}

/// Rewrite a single shape's visibility-encoding `Scale` into the owning
/// `ShapeVisual`'s `IsVisible`: a boolean keyframe animation over the same
/// progress timeline, driven by the scale animator's controller.
pub(crate) fn push_shape_tree_visibility_into_visual_tree(
    graph: &mut Graph,
    _index: &mut GraphIndex,
) -> bool {
    let mut progress = false;

    let shape_visuals: Vec<NodeId> = graph
        .collect_live()
        .into_iter()
        .filter(|&id| matches!(graph.kind(id), NodeKind::ShapeVisual(_)))
        .collect();

    for id in shape_visuals {
        let NodeKind::ShapeVisual(sv) = graph.kind(id) else {
            continue;
        };
        let &[shape] = &sv.shapes[..] else {
            continue;
        };
        if !graph.kind(shape).is_shape() {
            continue;
        }
        if !node_property_mask(graph, shape).intersects(PropertyMask::SCALE) {
            continue;
        }
        if !shape_scale_is_visibility_only(graph, shape) {
            continue;
        }
        // Merging two visibility timelines has no defined semantics; leave
        // the scale encoding in place if the visual already has one.
        if graph.visual(id).is_visible.is_some() || graph.is_animated(id, "IsVisible") {
            continue;
        }
        let scale_animator_count = graph
            .animators(shape)
            .iter()
            .filter(|a| a.target_property == "Scale")
            .count();
        if scale_animator_count > 1 {
            continue;
        }

        if scale_animator_count == 1 {
            let mut animator = graph
                .stop_animation(shape, "Scale")
                .expect("scale animator just counted");
            let NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)) =
                graph.kind(animator.animation)
            else {
                panic!(
                    "push_shape_tree_visibility_into_visual_tree: {} is not a Vector2 keyframe animation",
                    graph.kind(animator.animation).name()
                );
            };

            let mut frames = KeyFrames::new();
            for f in &k.frames {
                let KeyFrameValue::Value(v) = &f.value else {
                    panic!(
                        "push_shape_tree_visibility_into_visual_tree: expression keyframe in visibility scale"
                    );
                };
                frames.insert_value(f.progress, v.x != 0.0 || v.y != 0.0, Easing::Hold);
            }
            let bool_anim = graph.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Boolean(
                frames,
            )));

            graph.shape_transform_mut(shape).scale = None;
            match animator.controller.take() {
                Some(controller) => {
                    graph.start_controlled_animation(id, "IsVisible", bool_anim, controller);
                }
                None => graph.start_animation(id, "IsVisible", bool_anim),
            }
        } else {
            // Static visibility: a (0,0) scale means never visible.
            let scale = graph.shape_transform(shape).scale;
            graph.shape_transform_mut(shape).scale = None;
            if scale.is_some_and(|v| v.x == 0.0 && v.y == 0.0) {
                graph.visual_mut(id).is_visible = Some(false);
            }
        }
        trace!(visual = id.0, shape = shape.0, "moved shape visibility into visual tree");
        progress = true;
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{Color, Vec2, affine_approx_eq};
    use crate::graph::{
        ColorBrush, ContainerShape, ShapeVisual, SpriteShape, Visual,
    };

    fn shape_tree() -> (Graph, NodeId) {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let sv = g.alloc(NodeKind::ShapeVisual(ShapeVisual {
            visual: Visual::default(),
            view_box: None,
            shapes: Vec::new(),
        }));
        g.child_visuals_mut(g.root()).push(sv);
        (g, sv)
    }

    #[test]
    fn transparent_sprites_disappear() {
        let (mut g, sv) = shape_tree();
        let brush = g.alloc(NodeKind::ColorBrush(ColorBrush {
            color: Some(Color::TRANSPARENT),
        }));
        let sprite = g.alloc(NodeKind::SpriteShape(SpriteShape {
            fill_brush: Some(brush),
            ..SpriteShape::default()
        }));
        g.child_shapes_mut(sv).push(sprite);

        let mut index = GraphIndex::build(&g);
        assert!(elide_transparent_sprite_shapes(&mut g, &mut index));
        assert!(g.child_shapes(sv).is_empty());
    }

    #[test]
    fn opaque_sprites_survive() {
        let (mut g, sv) = shape_tree();
        let brush = g.alloc(NodeKind::ColorBrush(ColorBrush {
            color: Some(Color::BLACK),
        }));
        let sprite = g.alloc(NodeKind::SpriteShape(SpriteShape {
            fill_brush: Some(brush),
            ..SpriteShape::default()
        }));
        g.child_shapes_mut(sv).push(sprite);

        let mut index = GraphIndex::build(&g);
        assert!(!elide_transparent_sprite_shapes(&mut g, &mut index));
        assert_eq!(g.child_shapes(sv).len(), 1);
    }

    #[test]
    fn empty_containers_cascade_out() {
        let (mut g, sv) = shape_tree();
        let inner = g.alloc(NodeKind::ContainerShape(ContainerShape::default()));
        let outer = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![inner],
            ..ContainerShape::default()
        }));
        g.child_shapes_mut(sv).push(outer);

        let mut index = GraphIndex::build(&g);
        assert!(elide_empty_container_shapes(&mut g, &mut index));
        assert!(g.child_shapes(sv).is_empty());
    }

    #[test]
    fn structural_containers_splice_children() {
        let (mut g, sv) = shape_tree();
        let a = g.alloc(NodeKind::ContainerShape(ContainerShape::default()));
        let b = g.alloc(NodeKind::ContainerShape(ContainerShape::default()));
        let leaf_a = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let leaf_b = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        g.child_shapes_mut(a).push(leaf_a);
        g.child_shapes_mut(b).push(leaf_b);
        let wrapper = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![a, b],
            ..ContainerShape::default()
        }));
        g.child_shapes_mut(sv).push(wrapper);

        let mut index = GraphIndex::build(&g);
        assert!(elide_structural_container_shapes(&mut g, &mut index));
        // All three containers are structural; their leaves end up directly
        // under the shape visual.
        assert_eq!(g.child_shapes(sv), &vec![leaf_a, leaf_b]);
    }

    #[test]
    fn transform_push_down_multiplies_on_the_left() {
        let (mut g, sv) = shape_tree();
        let child = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let child_m = Affine::scale(2.0);
        g.shape_transform_mut(child).transform_matrix = Some(child_m);

        let container = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![child],
            ..ContainerShape::default()
        }));
        let parent_m = Affine::translate(Vec2::new(5.0, 0.0));
        g.shape_transform_mut(container).transform_matrix = Some(parent_m);
        g.child_shapes_mut(sv).push(container);

        let mut index = GraphIndex::build(&g);
        assert!(push_container_shape_transforms_down(&mut g, &mut index));

        assert_eq!(g.child_shapes(sv), &vec![child]);
        let m = g.shape_transform(child).transform_matrix.unwrap();
        assert!(affine_approx_eq(m, parent_m * child_m));
    }

    #[test]
    fn transform_push_down_blocked_by_animated_child_matrix() {
        let (mut g, sv) = shape_tree();
        let child = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(
            KeyFrames::new(),
        )));
        g.start_animation(child, "TransformMatrix", anim);

        let container = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![child],
            ..ContainerShape::default()
        }));
        g.shape_transform_mut(container).transform_matrix = Some(Affine::scale(3.0));
        g.child_shapes_mut(sv).push(container);

        let mut index = GraphIndex::build(&g);
        assert!(!push_container_shape_transforms_down(&mut g, &mut index));
        assert_eq!(g.child_shapes(sv), &vec![container]);
    }

    #[test]
    fn sibling_containers_merge_into_run_head() {
        let (mut g, sv) = shape_tree();
        let leaf_a = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let leaf_b = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let mk = |leaf: NodeId, g: &mut Graph| {
            let c = g.alloc(NodeKind::ContainerShape(ContainerShape {
                shapes: vec![leaf],
                ..ContainerShape::default()
            }));
            g.shape_transform_mut(c).offset = Some(Vec2::new(4.0, 0.0));
            c
        };
        let a = mk(leaf_a, &mut g);
        let b = mk(leaf_b, &mut g);
        g.child_shapes_mut(sv).extend([a, b]);

        let mut index = GraphIndex::build(&g);
        assert!(coalesce_sibling_container_shapes(&mut g, &mut index));
        assert_eq!(g.child_shapes(sv), &vec![a]);
        assert_eq!(g.child_shapes(a), &vec![leaf_a, leaf_b]);
    }

    #[test]
    fn differing_sibling_containers_stay_apart() {
        let (mut g, sv) = shape_tree();
        let leaf_a = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let a = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![leaf_a],
            ..ContainerShape::default()
        }));
        let leaf_b = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let b = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![leaf_b],
            ..ContainerShape::default()
        }));
        g.shape_transform_mut(a).offset = Some(Vec2::new(4.0, 0.0));
        g.shape_transform_mut(b).offset = Some(Vec2::new(5.0, 0.0));
        g.child_shapes_mut(sv).extend([a, b]);

        let mut index = GraphIndex::build(&g);
        assert!(!coalesce_sibling_container_shapes(&mut g, &mut index));
        assert_eq!(g.child_shapes(sv).len(), 2);
    }

    #[test]
    fn visibility_scale_moves_to_single_child() {
        let (mut g, sv) = shape_tree();
        let child = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        g.shape_transform_mut(child).offset = Some(Vec2::new(1.0, 1.0));
        let container = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![child],
            ..ContainerShape::default()
        }));
        g.shape_transform_mut(container).scale = Some(Vec2::ZERO);
        g.child_shapes_mut(sv).push(container);

        let mut index = GraphIndex::build(&g);
        assert!(push_shape_visibility_down(&mut g, &mut index));
        assert_eq!(g.child_shapes(sv), &vec![child]);
        assert_eq!(g.shape_transform(child).scale, Some(Vec2::ZERO));
        assert_eq!(g.shape_transform(child).offset, Some(Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn animated_visibility_scale_becomes_is_visible_keyframes() {
        let (mut g, sv) = shape_tree();
        let leaf = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let shape = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![leaf],
            ..ContainerShape::default()
        }));
        g.child_shapes_mut(sv).push(shape);

        let mut k = KeyFrames::new();
        k.insert_value(0.0, Vec2::ZERO, Easing::Hold);
        k.insert_value(0.25, Vec2::new(1.0, 1.0), Easing::Step);
        k.insert_value(0.75, Vec2::ZERO, Easing::Step);
        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)));
        g.start_animation(shape, "Scale", anim);

        let mut index = GraphIndex::build(&g);
        assert!(push_shape_tree_visibility_into_visual_tree(&mut g, &mut index));

        assert!(!g.is_animated(shape, "Scale"));
        assert!(g.shape_transform(shape).scale.is_none());
        let visibility = g
            .animators(sv)
            .iter()
            .find(|a| a.target_property == "IsVisible")
            .expect("IsVisible animator");
        let NodeKind::KeyFrameAnimation(KeyFrameAnimation::Boolean(frames)) =
            g.kind(visibility.animation)
        else {
            panic!("expected boolean keyframes");
        };
        let values: Vec<bool> = frames
            .frames
            .iter()
            .map(|f| match f.value {
                KeyFrameValue::Value(b) => b,
                KeyFrameValue::Expression(_) => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![false, true, false]);
    }

    #[test]
    fn visibility_rewrite_skips_visuals_with_existing_visibility() {
        let (mut g, sv) = shape_tree();
        let leaf = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let shape = g.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![leaf],
            ..ContainerShape::default()
        }));
        g.child_shapes_mut(sv).push(shape);
        g.shape_transform_mut(shape).scale = Some(Vec2::ZERO);
        g.visual_mut(sv).is_visible = Some(true);

        let mut index = GraphIndex::build(&g);
        assert!(!push_shape_tree_visibility_into_visual_tree(&mut g, &mut index));
        assert_eq!(g.shape_transform(shape).scale, Some(Vec2::ZERO));
    }
}
