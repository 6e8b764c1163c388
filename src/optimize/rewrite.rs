//! Shared rewrite machinery: elision and splice helpers, property and
//! animator migration, animator equivalence, and the visibility-encoded
//! scale predicate.
//!
//! Every helper here tolerates having been pre-empted by an earlier rewrite
//! in the same pass: when the node in question is no longer where the index
//! said it was, the helper declines and returns `false`.

use crate::foundation::core::Vec2;
use crate::graph::index::GraphIndex;
use crate::graph::{
    AnimationController, Animator, ExpressionAnimation, Graph, KeyFrameAnimation, KeyFrameValue,
    NodeId, NodeKind,
};

/// Whether `id` is still attached to the root through the index's parent
/// chain. Elisions null out the parent of every node they detach, so a dead
/// subtree's chain dead-ends before reaching the root.
pub(crate) fn is_live(graph: &Graph, index: &GraphIndex, id: NodeId) -> bool {
    let mut cur = id;
    loop {
        match index.parent(cur) {
            None => return cur == graph.root(),
            Some(p) => cur = p,
        }
    }
}

/// Best-effort author-metadata propagation when `eliminated` is rewritten
/// away and `replacement` stands in for it.
pub(crate) fn propagate_descriptions(graph: &mut Graph, eliminated: NodeId, replacement: NodeId) {
    let (short, long, name) = {
        let n = graph.node(eliminated);
        (
            n.short_description.clone(),
            n.long_description.clone(),
            n.name.clone(),
        )
    };
    let r = graph.node_mut(replacement);
    if let Some(short) = short {
        r.short_description = Some(match r.short_description.take() {
            None => short,
            Some(existing) => format!("{short} {existing}"),
        });
    }
    if let Some(long) = long
        && r.long_description.is_none()
    {
        r.long_description = Some(long);
    }
    if let Some(name) = name
        && r.name.is_none()
    {
        r.name = Some(name);
    }
}

fn shape_list_mut(graph: &mut Graph, owner: NodeId) -> Option<&mut Vec<NodeId>> {
    match graph.kind_mut(owner) {
        NodeKind::ContainerShape(c) => Some(&mut c.shapes),
        NodeKind::ShapeVisual(s) => Some(&mut s.shapes),
        _ => None,
    }
}

/// Remove `shape` from its owner's shape list.
pub(crate) fn remove_shape_child(graph: &mut Graph, index: &mut GraphIndex, shape: NodeId) -> bool {
    let Some(parent) = index.parent(shape) else {
        return false;
    };
    let Some(list) = shape_list_mut(graph, parent) else {
        return false;
    };
    let Some(pos) = list.iter().position(|&c| c == shape) else {
        return false;
    };
    list.remove(pos);
    index.set_parent(shape, None);
    true
}

/// Splice `container`'s shapes into its parent's list in place of
/// `container`.
pub(crate) fn elide_container_shape(
    graph: &mut Graph,
    index: &mut GraphIndex,
    container: NodeId,
) -> bool {
    let Some(parent) = index.parent(container) else {
        return false;
    };
    let NodeKind::ContainerShape(c) = graph.kind(container) else {
        return false;
    };
    let children = c.shapes.clone();

    let Some(list) = shape_list_mut(graph, parent) else {
        return false;
    };
    let Some(pos) = list.iter().position(|&c| c == container) else {
        return false;
    };
    list.splice(pos..=pos, children.iter().copied());

    index.set_parent(container, None);
    for &child in &children {
        index.set_parent(child, Some(parent));
        propagate_descriptions(graph, container, child);
    }
    true
}

/// Splice `container`'s child visuals into its parent's list in place of
/// `container`.
pub(crate) fn elide_container_visual(
    graph: &mut Graph,
    index: &mut GraphIndex,
    container: NodeId,
) -> bool {
    let Some(parent) = index.parent(container) else {
        return false;
    };
    let NodeKind::ContainerVisual(v) = graph.kind(container) else {
        return false;
    };
    let children = v.children.clone();

    if !graph.kind(parent).is_visual() {
        return false;
    }
    let list = graph.child_visuals_mut(parent);
    let Some(pos) = list.iter().position(|&c| c == container) else {
        return false;
    };
    list.splice(pos..=pos, children.iter().copied());

    index.set_parent(container, None);
    for &child in &children {
        index.set_parent(child, Some(parent));
        propagate_descriptions(graph, container, child);
    }
    true
}

/// Replace `node` with `replacement` in its parent's child-visual list, or
/// re-root the graph when `node` is the root.
pub(crate) fn replace_visual_in_parent(
    graph: &mut Graph,
    index: &mut GraphIndex,
    node: NodeId,
    replacement: NodeId,
) -> bool {
    match index.parent(node) {
        None => {
            if graph.root() != node {
                return false;
            }
            graph.set_root(replacement);
            index.set_parent(replacement, None);
            index.set_parent(node, None);
            true
        }
        Some(parent) => {
            if !graph.kind(parent).is_visual() {
                return false;
            }
            let list = graph.child_visuals_mut(parent);
            let Some(pos) = list.iter().position(|&c| c == node) else {
                return false;
            };
            list[pos] = replacement;
            index.set_parent(replacement, Some(parent));
            index.set_parent(node, None);
            true
        }
    }
}

/// Move every animator from `from` onto `to`, retargeting expression
/// references that pointed at `from` itself.
pub(crate) fn transfer_animators(graph: &mut Graph, from: NodeId, to: NodeId) {
    let animators = std::mem::take(&mut graph.node_mut(from).animators);

    let mut animation_ids = Vec::new();
    collect_animation_ids(&animators, &mut animation_ids);
    for aid in animation_ids {
        if let NodeKind::ExpressionAnimation(e) = graph.kind_mut(aid) {
            for (_, target) in &mut e.references {
                if *target == from {
                    *target = to;
                }
            }
        }
    }

    graph.node_mut(to).animators.extend(animators);
}

fn collect_animation_ids(animators: &[Animator], out: &mut Vec<NodeId>) {
    for a in animators {
        out.push(a.animation);
        if let Some(controller) = &a.controller {
            collect_animation_ids(&controller.animators, out);
        }
    }
}

/// Move all set transform slots from shape `from` onto shape `to`, along
/// with property-set members and animators. The caller has already
/// established that the occupied slots are disjoint.
pub(crate) fn transfer_shape_properties(graph: &mut Graph, from: NodeId, to: NodeId) {
    let taken = std::mem::take(graph.shape_transform_mut(from));
    let t = graph.shape_transform_mut(to);
    if taken.center_point.is_some() {
        t.center_point = taken.center_point;
    }
    if taken.offset.is_some() {
        t.offset = taken.offset;
    }
    if taken.rotation_degrees.is_some() {
        t.rotation_degrees = taken.rotation_degrees;
    }
    if taken.scale.is_some() {
        t.scale = taken.scale;
    }
    if taken.transform_matrix.is_some() {
        t.transform_matrix = taken.transform_matrix;
    }

    let mut props = std::mem::take(&mut graph.node_mut(from).properties);
    graph.node_mut(to).properties.merge_from(&mut props);

    transfer_animators(graph, from, to);
}

/// Move all set visual state from `from` onto `to` (transform slots, size,
/// opacity, visibility, clip, border mode), plus property-set members and
/// animators. Child lists are untouched.
pub(crate) fn transfer_visual_properties(
    graph: &mut Graph,
    index: &mut GraphIndex,
    from: NodeId,
    to: NodeId,
) {
    let (taken_transform, size, opacity, is_visible, clip, border_mode) = {
        let v = graph.visual_mut(from);
        (
            std::mem::take(&mut v.transform),
            v.size.take(),
            v.opacity.take(),
            v.is_visible.take(),
            v.clip.take(),
            v.border_mode.take(),
        )
    };

    let v = graph.visual_mut(to);
    let t = &mut v.transform;
    if taken_transform.center_point.is_some() {
        t.center_point = taken_transform.center_point;
    }
    if taken_transform.offset.is_some() {
        t.offset = taken_transform.offset;
    }
    if taken_transform.rotation_degrees.is_some() {
        t.rotation_degrees = taken_transform.rotation_degrees;
    }
    if taken_transform.rotation_axis.is_some() {
        t.rotation_axis = taken_transform.rotation_axis;
    }
    if taken_transform.scale.is_some() {
        t.scale = taken_transform.scale;
    }
    if taken_transform.transform_matrix.is_some() {
        t.transform_matrix = taken_transform.transform_matrix;
    }
    if size.is_some() {
        v.size = size;
    }
    if opacity.is_some() {
        v.opacity = opacity;
    }
    if is_visible.is_some() {
        v.is_visible = is_visible;
    }
    if let Some(clip) = clip {
        v.clip = Some(clip);
        index.set_parent(clip, Some(to));
    }
    if border_mode.is_some() {
        v.border_mode = border_mode;
    }

    let mut props = std::mem::take(&mut graph.node_mut(from).properties);
    graph.node_mut(to).properties.merge_from(&mut props);

    transfer_animators(graph, from, to);
}

/// Animator equivalence for sibling coalescing.
///
/// Keyframe animations compare by reference; expression animations compare
/// by expression string and reference parameters, where a parameter pair
/// matches if both name the same node or each names its own owner.
pub(crate) fn animators_equal(
    graph: &Graph,
    owner_a: NodeId,
    a: &Animator,
    owner_b: NodeId,
    b: &Animator,
) -> bool {
    if a.target_property != b.target_property {
        return false;
    }
    let animations_match = match (graph.kind(a.animation), graph.kind(b.animation)) {
        (NodeKind::KeyFrameAnimation(_), NodeKind::KeyFrameAnimation(_)) => {
            a.animation == b.animation
        }
        (NodeKind::ExpressionAnimation(ea), NodeKind::ExpressionAnimation(eb)) => {
            expression_animations_equal(ea, eb, owner_a, owner_b)
        }
        _ => false,
    };
    animations_match
        && controllers_equal(
            graph,
            owner_a,
            a.controller.as_ref(),
            owner_b,
            b.controller.as_ref(),
        )
}

fn controllers_equal(
    graph: &Graph,
    owner_a: NodeId,
    a: Option<&AnimationController>,
    owner_b: NodeId,
    b: Option<&AnimationController>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.paused == b.paused
                && a.animators.len() == b.animators.len()
                && a.animators
                    .iter()
                    .zip(b.animators.iter())
                    .all(|(x, y)| animators_equal(graph, owner_a, x, owner_b, y))
        }
        _ => false,
    }
}

pub(crate) fn expression_animations_equal(
    a: &ExpressionAnimation,
    b: &ExpressionAnimation,
    owner_a: NodeId,
    owner_b: NodeId,
) -> bool {
    a.expression == b.expression
        && a.references.len() == b.references.len()
        && a.references.iter().all(|(name, ta)| match b.reference(name) {
            Some(tb) => *ta == tb || (*ta == owner_a && tb == owner_b),
            None => false,
        })
}

/// Two container shapes may be merged when everything but their child lists
/// is identical.
pub(crate) fn container_shapes_equivalent_modulo_children(
    graph: &Graph,
    a: NodeId,
    b: NodeId,
) -> bool {
    let (NodeKind::ContainerShape(_), NodeKind::ContainerShape(_)) =
        (graph.kind(a), graph.kind(b))
    else {
        return false;
    };
    if graph.shape_transform(a) != graph.shape_transform(b) {
        return false;
    }
    if !graph.properties(a).is_empty() || !graph.properties(b).is_empty() {
        return false;
    }
    let aa = graph.animators(a);
    let ba = graph.animators(b);
    aa.len() == ba.len()
        && aa
            .iter()
            .zip(ba.iter())
            .all(|(x, y)| animators_equal(graph, a, x, b, y))
}

/// Whether a brush slot draws nothing.
pub(crate) fn brush_is_transparent(graph: &Graph, brush: Option<NodeId>) -> bool {
    match brush {
        None => true,
        Some(b) => match graph.kind(b) {
            NodeKind::ColorBrush(cb) => {
                !graph.is_animated(b, "Color") && cb.color.is_none_or(|c| c.is_transparent())
            }
            _ => false,
        },
    }
}

pub(crate) fn is_visibility_pair(v: Vec2) -> bool {
    (v.x == 0.0 && v.y == 0.0) || (v.x == 1.0 && v.y == 1.0)
}

/// Whether a shape's `Scale` slot encodes visibility and nothing else: the
/// static value, if any, is `(0,0)` or `(1,1)`, and every scale animator is
/// a vector-2 keyframe animation stepping between those two values.
pub(crate) fn shape_scale_is_visibility_only(graph: &Graph, id: NodeId) -> bool {
    let t = graph.shape_transform(id);
    if let Some(s) = t.scale
        && !is_visibility_pair(s)
    {
        return false;
    }
    let mut encodes = t.scale.is_some();

    for animator in graph
        .animators(id)
        .iter()
        .filter(|a| a.target_property == "Scale")
    {
        encodes = true;
        let NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)) =
            graph.kind(animator.animation)
        else {
            return false;
        };
        let all_step_visibility = k.frames.iter().all(|f| {
            f.easing.is_discrete()
                && matches!(&f.value, KeyFrameValue::Value(v) if is_visibility_pair(*v))
        });
        if !all_step_visibility {
            return false;
        }
    }

    encodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ColorBrush, ContainerShape, Easing, KeyFrames, Visual};
    use crate::foundation::core::Color;

    fn graph_with_shapes(n: usize) -> (Graph, Vec<NodeId>) {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let shapes: Vec<_> = (0..n)
            .map(|_| g.alloc(NodeKind::ContainerShape(ContainerShape::default())))
            .collect();
        let sv = g.alloc(NodeKind::ShapeVisual(crate::graph::ShapeVisual {
            visual: Visual::default(),
            view_box: None,
            shapes: shapes.clone(),
        }));
        g.child_visuals_mut(g.root()).push(sv);
        (g, shapes)
    }

    #[test]
    fn elide_splices_children_in_place() {
        let (mut g, shapes) = graph_with_shapes(3);
        let inner = g.alloc(NodeKind::ContainerShape(ContainerShape::default()));
        g.child_shapes_mut(shapes[1]).push(inner);

        let mut index = GraphIndex::build(&g);
        assert!(elide_container_shape(&mut g, &mut index, shapes[1]));

        let parent = index.parent(inner).unwrap();
        let list = g.child_shapes(parent);
        assert_eq!(list, &vec![shapes[0], inner, shapes[2]]);
    }

    #[test]
    fn elide_tolerates_preemption() {
        let (mut g, shapes) = graph_with_shapes(1);
        let mut index = GraphIndex::build(&g);
        assert!(remove_shape_child(&mut g, &mut index, shapes[0]));
        // A second rewrite targeting the same node declines.
        assert!(!elide_container_shape(&mut g, &mut index, shapes[0]));
    }

    #[test]
    fn description_propagation_prefers_existing_long_description() {
        let (mut g, shapes) = graph_with_shapes(2);
        g.node_mut(shapes[0]).short_description = Some("outer".to_owned());
        g.node_mut(shapes[0]).long_description = Some("outer detail".to_owned());
        g.node_mut(shapes[1]).short_description = Some("inner".to_owned());
        g.node_mut(shapes[1]).long_description = Some("inner detail".to_owned());

        propagate_descriptions(&mut g, shapes[0], shapes[1]);
        let n = g.node(shapes[1]);
        assert_eq!(n.short_description.as_deref(), Some("outer inner"));
        assert_eq!(n.long_description.as_deref(), Some("inner detail"));
    }

    #[test]
    fn transparent_brush_rules() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        assert!(brush_is_transparent(&g, None));

        let clear = g.alloc(NodeKind::ColorBrush(ColorBrush {
            color: Some(Color::TRANSPARENT),
        }));
        assert!(brush_is_transparent(&g, Some(clear)));

        let opaque = g.alloc(NodeKind::ColorBrush(ColorBrush {
            color: Some(Color::BLACK),
        }));
        assert!(!brush_is_transparent(&g, Some(opaque)));

        // An animated color may become visible at any time.
        let animated = g.alloc(NodeKind::ColorBrush(ColorBrush {
            color: Some(Color::TRANSPARENT),
        }));
        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Color(
            KeyFrames::new(),
        )));
        g.start_animation(animated, "Color", anim);
        assert!(!brush_is_transparent(&g, Some(animated)));
    }

    #[test]
    fn visibility_scale_requires_step_easing() {
        let (mut g, shapes) = graph_with_shapes(1);
        let s = shapes[0];
        g.shape_transform_mut(s).scale = Some(Vec2::new(1.0, 1.0));
        assert!(shape_scale_is_visibility_only(&g, s));

        let mut k = KeyFrames::new();
        k.insert_value(0.0, Vec2::ZERO, Easing::Hold);
        k.insert_value(0.5, Vec2::new(1.0, 1.0), Easing::Step);
        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)));
        g.start_animation(s, "Scale", anim);
        assert!(shape_scale_is_visibility_only(&g, s));

        let mut k = KeyFrames::new();
        k.insert_value(0.0, Vec2::ZERO, Easing::Linear);
        let linear = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)));
        g.start_animation(s, "Scale", linear);
        assert!(!shape_scale_is_visibility_only(&g, s));
    }

    #[test]
    fn expression_equality_accepts_owner_aliases() {
        let (g, shapes) = graph_with_shapes(2);
        let (a, b) = (shapes[0], shapes[1]);

        let mut ea = ExpressionAnimation::new("my.Progress");
        ea.set_reference_parameter("my", a);
        let mut eb = ExpressionAnimation::new("my.Progress");
        eb.set_reference_parameter("my", b);
        assert!(expression_animations_equal(&ea, &eb, a, b));

        let mut ec = ExpressionAnimation::new("my.Progress");
        ec.set_reference_parameter("my", g.root());
        assert!(!expression_animations_equal(&ea, &ec, a, b));
    }

    #[test]
    fn transfer_retargets_self_references() {
        let (mut g, shapes) = graph_with_shapes(2);
        let (from, to) = (shapes[0], shapes[1]);

        let mut e = ExpressionAnimation::new("my.Progress");
        e.set_reference_parameter("my", from);
        let expr = g.alloc(NodeKind::ExpressionAnimation(e));
        g.start_animation(from, "Opacity", expr);

        transfer_animators(&mut g, from, to);

        assert!(g.animators(from).is_empty());
        assert_eq!(g.animators(to).len(), 1);
        let NodeKind::ExpressionAnimation(e) = g.kind(expr) else {
            unreachable!();
        };
        assert_eq!(e.reference("my"), Some(to));
    }
}
