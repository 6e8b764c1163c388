//! The graph optimizer: a fixed-point rewriting engine over the composition
//! graph.
//!
//! Each iteration canonicalises properties, re-indexes parents, then runs
//! the shape passes and the visual passes in a fixed order. The driver is
//! node-count monotone: it loops while the number of live nodes strictly
//! decreases, which bounds it to at most `|G|` iterations.
//!
//! Rewrites are pure local transformations; a failed precondition is a
//! silent skip, never an error.

mod bitset;
mod rewrite;
mod shapes;
mod simplify;
mod visuals;

use tracing::debug;

use crate::graph::Graph;
use crate::graph::index::GraphIndex;

/// Optimize the graph in place until a whole pass sweep stops shrinking it.
pub fn optimize(graph: &mut Graph) {
    let mut count = graph.live_node_count();
    let mut iteration = 0u32;
    loop {
        iteration += 1;
        run_pass_suite(graph);
        let now = graph.live_node_count();
        debug!(iteration, before = count, after = now, "optimizer sweep");
        if now >= count {
            break;
        }
        count = now;
    }
}

fn run_pass_suite(graph: &mut Graph) {
    simplify::simplify_properties(graph);

    let mut index = GraphIndex::build(graph);
    shapes::elide_transparent_sprite_shapes(graph, &mut index);
    shapes::coalesce_sibling_container_shapes(graph, &mut index);
    shapes::elide_empty_container_shapes(graph, &mut index);
    shapes::elide_structural_container_shapes(graph, &mut index);
    shapes::push_container_shape_transforms_down(graph, &mut index);
    shapes::coalesce_single_child_container_shapes(graph, &mut index);
    shapes::push_properties_down_to_sprite_shape(graph, &mut index);
    shapes::push_shape_visibility_down(graph, &mut index);
    shapes::push_shape_tree_visibility_into_visual_tree(graph, &mut index);

    let mut index = GraphIndex::build(graph);
    visuals::push_properties_down_to_shape_visual(graph, &mut index);
    visuals::coalesce_container_visuals(graph, &mut index);
    visuals::coalesce_orthogonal_visuals(graph, &mut index);
    visuals::coalesce_orthogonal_container_visuals(graph, &mut index);
    visuals::remove_redundant_inset_clip_visuals(graph, &mut index);
}
