//! Visual-tree rewrite passes.
//!
//! Same visiting discipline as the shape passes: snapshot candidates, then
//! re-check every precondition per visit. A container that is the source of
//! a `VisualSurface`, or that is referenced by an expression animation, is
//! never folded.

use tracing::trace;

use crate::graph::index::GraphIndex;
use crate::graph::{Graph, NodeId, NodeKind};
use crate::optimize::bitset::{PropertyMask, are_orthogonal, node_property_mask};
use crate::optimize::rewrite::{
    elide_container_visual, is_live, propagate_descriptions, replace_visual_in_parent,
    transfer_visual_properties,
};

fn live_container_visuals(graph: &Graph) -> Vec<NodeId> {
    graph
        .collect_live()
        .into_iter()
        .filter(|&id| matches!(graph.kind(id), NodeKind::ContainerVisual(_)))
        .collect()
}

fn clip_is_zero_inset(graph: &Graph, clip: NodeId) -> bool {
    matches!(graph.kind(clip), NodeKind::InsetClip(c) if c.is_zero())
        && graph.animators(clip).is_empty()
}

/// A container over a single shape visual whose only state is a zero inset
/// clip plus a size equal to the child's drops both; they are implicit on
/// the shape visual.
pub(crate) fn push_properties_down_to_shape_visual(
    graph: &mut Graph,
    index: &mut GraphIndex,
) -> bool {
    let mut progress = false;
    for id in live_container_visuals(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerVisual(v) = graph.kind(id) else {
            continue;
        };
        let &[child] = &v.children[..] else {
            continue;
        };
        if !matches!(graph.kind(child), NodeKind::ShapeVisual(_)) {
            continue;
        }
        if node_property_mask(graph, id) != (PropertyMask::CLIP | PropertyMask::SIZE) {
            continue;
        }
        let Some(clip) = graph.visual(id).clip else {
            continue;
        };
        if !clip_is_zero_inset(graph, clip) {
            continue;
        }
        let (Some(size), child_size) = (graph.visual(id).size, graph.visual(child).size) else {
            continue;
        };
        if child_size != Some(size) {
            continue;
        }

        let v = graph.visual_mut(id);
        v.clip = None;
        v.size = None;
        index.set_parent(clip, None);
        trace!(node = id.0, "dropped implicit clip and size above shape visual");
        progress = true;
    }
    progress
}

/// Splice out container visuals that set nothing at all. A property-less
/// root with a single child hands the root over to that child.
pub(crate) fn coalesce_container_visuals(graph: &mut Graph, index: &mut GraphIndex) -> bool {
    let mut progress = false;
    for id in live_container_visuals(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerVisual(v) = graph.kind(id) else {
            continue;
        };
        if v.children.is_empty() {
            continue;
        }
        let children = v.children.clone();
        if !node_property_mask(graph, id).is_empty() {
            continue;
        }
        if !graph.properties(id).is_empty() || index.has_in_references(id) {
            continue;
        }

        let done = if index.parent(id).is_some() {
            elide_container_visual(graph, index, id)
        } else if graph.root() == id
            && let &[only] = &children[..]
        {
            propagate_descriptions(graph, id, only);
            replace_visual_in_parent(graph, index, id, only)
        } else {
            false
        };
        if done {
            trace!(node = id.0, "coalesced container visual");
            progress = true;
        }
    }
    progress
}

fn coalesce_preconditions(
    graph: &Graph,
    index: &GraphIndex,
    parent: NodeId,
    child: NodeId,
) -> bool {
    if index.has_in_references(parent) || index.is_visual_surface_source(graph, parent) {
        return false;
    }
    are_orthogonal(
        node_property_mask(graph, parent),
        node_property_mask(graph, child),
    )
}

/// Merge an orthogonal container/leaf-visual pair: the container's
/// properties transfer onto its sole sprite or shape visual child, which
/// then takes the container's place.
pub(crate) fn coalesce_orthogonal_visuals(graph: &mut Graph, index: &mut GraphIndex) -> bool {
    let mut progress = false;
    for id in live_container_visuals(graph) {
        let NodeKind::ContainerVisual(v) = graph.kind(id) else {
            continue;
        };
        let &[child] = &v.children[..] else {
            continue;
        };
        if !matches!(
            graph.kind(child),
            NodeKind::SpriteVisual(_) | NodeKind::ShapeVisual(_)
        ) {
            continue;
        }
        match index.parent(id) {
            Some(gp) if matches!(graph.kind(gp), NodeKind::ContainerVisual(_)) => {}
            None if graph.root() == id => {}
            _ => continue,
        }
        if !graph.properties(id).is_empty() {
            continue;
        }
        if !coalesce_preconditions(graph, index, id, child) {
            continue;
        }

        transfer_visual_properties(graph, index, id, child);
        propagate_descriptions(graph, id, child);
        if replace_visual_in_parent(graph, index, id, child) {
            trace!(parent = id.0, child = child.0, "coalesced orthogonal visuals");
            progress = true;
        }
    }
    progress
}

/// Merge an orthogonal container/container pair, transferring upward: the
/// child's properties move onto the parent and the child is spliced out.
pub(crate) fn coalesce_orthogonal_container_visuals(
    graph: &mut Graph,
    index: &mut GraphIndex,
) -> bool {
    let mut progress = false;
    for id in live_container_visuals(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerVisual(v) = graph.kind(id) else {
            continue;
        };
        let &[child] = &v.children[..] else {
            continue;
        };
        if !matches!(graph.kind(child), NodeKind::ContainerVisual(_)) {
            continue;
        }
        if index.has_in_references(child) || index.is_visual_surface_source(graph, child) {
            continue;
        }
        if !graph.properties(child).is_empty() {
            continue;
        }
        if !are_orthogonal(
            node_property_mask(graph, id),
            node_property_mask(graph, child),
        ) {
            continue;
        }

        transfer_visual_properties(graph, index, child, id);
        if elide_container_visual(graph, index, child) {
            trace!(parent = id.0, child = child.0, "coalesced orthogonal containers");
            progress = true;
        }
    }
    progress
}

/// A container holding only a zero inset clip and a size equal to its sole
/// shape-visual child's size is redundant; the child replaces it.
pub(crate) fn remove_redundant_inset_clip_visuals(
    graph: &mut Graph,
    index: &mut GraphIndex,
) -> bool {
    let mut progress = false;
    for id in live_container_visuals(graph) {
        if !is_live(graph, index, id) {
            continue;
        }
        let NodeKind::ContainerVisual(v) = graph.kind(id) else {
            continue;
        };
        let &[child] = &v.children[..] else {
            continue;
        };
        if !matches!(graph.kind(child), NodeKind::ShapeVisual(_)) {
            continue;
        }
        if node_property_mask(graph, id) != (PropertyMask::CLIP | PropertyMask::SIZE) {
            continue;
        }
        let Some(clip) = graph.visual(id).clip else {
            continue;
        };
        if !clip_is_zero_inset(graph, clip) {
            continue;
        }
        let Some(size) = graph.visual(id).size else {
            continue;
        };
        if graph.visual(child).size != Some(size) {
            continue;
        }
        if !graph.properties(id).is_empty() || index.has_in_references(id) {
            continue;
        }

        propagate_descriptions(graph, id, child);
        if replace_visual_in_parent(graph, index, id, child) {
            index.set_parent(clip, None);
            trace!(node = id.0, "removed redundant inset-clip visual");
            progress = true;
        }
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{Vec2, Vector3};
    use crate::graph::{
        InsetClip, ShapeVisual, SpriteVisual, SurfaceBrush, Visual, VisualSurface,
    };

    fn container(graph: &mut Graph) -> NodeId {
        graph.alloc(NodeKind::ContainerVisual(Visual::default()))
    }

    fn shape_visual(graph: &mut Graph, size: Option<Vec2>) -> NodeId {
        graph.alloc(NodeKind::ShapeVisual(ShapeVisual {
            visual: Visual {
                size,
                ..Visual::default()
            },
            view_box: None,
            shapes: Vec::new(),
        }))
    }

    #[test]
    fn propertyless_root_hands_over_to_sole_child() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let child = shape_visual(&mut g, Some(Vec2::new(100.0, 100.0)));
        g.child_visuals_mut(g.root()).push(child);

        let mut index = GraphIndex::build(&g);
        assert!(coalesce_container_visuals(&mut g, &mut index));
        assert_eq!(g.root(), child);
    }

    #[test]
    fn orthogonal_pair_merges_onto_leaf() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let parent = container(&mut g);
        g.visual_mut(parent).opacity = Some(0.5);
        let child = g.alloc(NodeKind::SpriteVisual(SpriteVisual {
            visual: Visual::default(),
            brush: None,
        }));
        g.visual_mut(child).transform.offset = Some(Vector3::new(1.0, 2.0, 0.0));
        g.child_visuals_mut(parent).push(child);
        g.child_visuals_mut(g.root()).push(parent);

        let mut index = GraphIndex::build(&g);
        assert!(coalesce_orthogonal_visuals(&mut g, &mut index));

        assert_eq!(g.child_visuals(g.root()), &vec![child]);
        assert_eq!(g.visual(child).opacity, Some(0.5));
        assert_eq!(
            g.visual(child).transform.offset,
            Some(Vector3::new(1.0, 2.0, 0.0))
        );
    }

    #[test]
    fn order_violating_pair_stays_nested() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let parent = container(&mut g);
        g.visual_mut(parent).transform.scale = Some(Vector3::new(2.0, 2.0, 1.0));
        let child = container(&mut g);
        g.visual_mut(child).transform.offset = Some(Vector3::new(3.0, 0.0, 0.0));
        g.child_visuals_mut(parent).push(child);
        // A sibling keeps the root out of the sole-child pattern.
        let sibling = shape_visual(&mut g, None);
        g.child_visuals_mut(g.root()).push(parent);
        g.child_visuals_mut(g.root()).push(sibling);

        let mut index = GraphIndex::build(&g);
        assert!(!coalesce_orthogonal_container_visuals(&mut g, &mut index));
        assert_eq!(g.child_visuals(parent), &vec![child]);
    }

    #[test]
    fn container_coalesce_transfers_child_state_upward() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let parent = container(&mut g);
        g.visual_mut(parent).opacity = Some(0.5);
        let child = container(&mut g);
        g.visual_mut(child).transform.offset = Some(Vector3::new(3.0, 0.0, 0.0));
        let leaf = shape_visual(&mut g, None);
        g.child_visuals_mut(child).push(leaf);
        g.child_visuals_mut(parent).push(child);
        // A sibling keeps the root out of the sole-child pattern.
        let sibling = shape_visual(&mut g, None);
        g.child_visuals_mut(g.root()).push(parent);
        g.child_visuals_mut(g.root()).push(sibling);

        let mut index = GraphIndex::build(&g);
        assert!(coalesce_orthogonal_container_visuals(&mut g, &mut index));

        assert_eq!(g.child_visuals(parent), &vec![leaf]);
        assert_eq!(g.visual(parent).opacity, Some(0.5));
        assert_eq!(
            g.visual(parent).transform.offset,
            Some(Vector3::new(3.0, 0.0, 0.0))
        );
    }

    #[test]
    fn visual_surface_source_is_never_folded() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let parent = container(&mut g);
        g.visual_mut(parent).opacity = Some(0.5);
        let child = shape_visual(&mut g, None);
        g.child_visuals_mut(parent).push(child);
        g.child_visuals_mut(g.root()).push(parent);

        let surface = g.alloc(NodeKind::VisualSurface(VisualSurface {
            source_visual: Some(parent),
            ..VisualSurface::default()
        }));
        let brush = g.alloc(NodeKind::SurfaceBrush(SurfaceBrush {
            surface: Some(surface),
        }));
        let sprite = g.alloc(NodeKind::SpriteVisual(SpriteVisual {
            visual: Visual::default(),
            brush: Some(brush),
        }));
        g.child_visuals_mut(g.root()).push(sprite);

        let mut index = GraphIndex::build(&g);
        assert!(!coalesce_orthogonal_visuals(&mut g, &mut index));
        assert_eq!(g.child_visuals(parent), &vec![child]);
    }

    #[test]
    fn redundant_inset_clip_wrapper_is_replaced_by_child() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let size = Vec2::new(64.0, 64.0);
        let clip = g.alloc(NodeKind::InsetClip(InsetClip::default()));
        let wrapper = container(&mut g);
        g.visual_mut(wrapper).clip = Some(clip);
        g.visual_mut(wrapper).size = Some(size);
        let child = shape_visual(&mut g, Some(size));
        g.child_visuals_mut(wrapper).push(child);
        g.child_visuals_mut(g.root()).push(wrapper);

        let mut index = GraphIndex::build(&g);
        assert!(remove_redundant_inset_clip_visuals(&mut g, &mut index));
        assert_eq!(g.child_visuals(g.root()), &vec![child]);
    }

    #[test]
    fn nonzero_inset_clip_blocks_removal() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let size = Vec2::new(64.0, 64.0);
        let clip = g.alloc(NodeKind::InsetClip(InsetClip {
            left: 2.0,
            ..InsetClip::default()
        }));
        let wrapper = container(&mut g);
        g.visual_mut(wrapper).clip = Some(clip);
        g.visual_mut(wrapper).size = Some(size);
        let child = shape_visual(&mut g, Some(size));
        g.child_visuals_mut(wrapper).push(child);
        g.child_visuals_mut(g.root()).push(wrapper);

        let mut index = GraphIndex::build(&g);
        assert!(!remove_redundant_inset_clip_visuals(&mut g, &mut index));
        assert_eq!(g.child_visuals(g.root()), &vec![wrapper]);
    }

    #[test]
    fn implicit_clip_and_size_dropped_above_shape_visual() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let size = Vec2::new(32.0, 32.0);
        let clip = g.alloc(NodeKind::InsetClip(InsetClip::default()));
        let wrapper = container(&mut g);
        g.visual_mut(wrapper).clip = Some(clip);
        g.visual_mut(wrapper).size = Some(size);
        let child = shape_visual(&mut g, Some(size));
        g.child_visuals_mut(wrapper).push(child);
        g.child_visuals_mut(g.root()).push(wrapper);

        let mut index = GraphIndex::build(&g);
        assert!(push_properties_down_to_shape_visual(&mut g, &mut index));
        let v = g.visual(wrapper);
        assert!(v.clip.is_none());
        assert!(v.size.is_none());
    }
}
