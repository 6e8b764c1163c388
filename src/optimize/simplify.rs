//! Property simplifier.
//!
//! Canonicalises transform slots into a single `TransformMatrix` when the
//! result is statically determinable, and clears semantically inert slots.
//! Never folds an animated property, and never folds a 3-D rotation about a
//! non-Z axis (not representable as a planar matrix in this IR).

use crate::foundation::core::{
    Affine, Vec2, Vector3, affine_is_identity, rotate_about_degrees, scale_about,
};
use crate::graph::{Graph, NodeId, NodeKind};

/// Run the simplifier over every visual and shape. Returns whether anything
/// changed.
pub(crate) fn simplify_properties(graph: &mut Graph) -> bool {
    let mut progress = false;
    for id in graph.collect_live() {
        progress |= match graph.kind(id) {
            NodeKind::ContainerShape(_) | NodeKind::SpriteShape(_) => simplify_shape(graph, id),
            NodeKind::ContainerVisual(_) | NodeKind::ShapeVisual(_) | NodeKind::SpriteVisual(_) => {
                simplify_visual(graph, id)
            }
            _ => false,
        };
    }
    progress
}

fn simplify_shape(graph: &mut Graph, id: NodeId) -> bool {
    let mut progress = false;

    let scale_animated = graph.is_animated(id, "Scale");
    let rotation_animated = graph.is_animated(id, "RotationAngleInDegrees");

    // CenterPoint is observable only while something rotates or scales
    // around it.
    {
        let t = graph.shape_transform_mut(id);
        if t.center_point.is_some()
            && t.scale.is_none()
            && t.rotation_degrees.is_none()
            && !scale_animated
            && !rotation_animated
        {
            t.center_point = None;
            progress = true;
        }
    }

    if !graph.animators(id).is_empty() {
        return progress;
    }

    let t = graph.shape_transform_mut(id);
    if t.center_point.is_none()
        && t.offset.is_none()
        && t.rotation_degrees.is_none()
        && t.scale.is_none()
    {
        return progress;
    }

    // A point passes through the matrix first, then offset, rotation, and
    // scale, each about the center point where applicable.
    let center = t.center_point.unwrap_or(Vec2::ZERO);
    let mut combined = t.transform_matrix.unwrap_or(Affine::IDENTITY);
    if let Some(offset) = t.offset {
        combined = Affine::translate(offset) * combined;
    }
    if let Some(degrees) = t.rotation_degrees {
        combined = rotate_about_degrees(degrees, center) * combined;
    }
    if let Some(scale) = t.scale {
        combined = scale_about(scale, center) * combined;
    }

    t.center_point = None;
    t.offset = None;
    t.rotation_degrees = None;
    t.scale = None;
    t.transform_matrix = if affine_is_identity(combined) {
        None
    } else {
        Some(combined)
    };
    true
}

fn simplify_visual(graph: &mut Graph, id: NodeId) -> bool {
    let mut progress = false;

    let scale_animated = graph.is_animated(id, "Scale");
    let rotation_animated = graph.is_animated(id, "RotationAngleInDegrees");

    {
        let t = &mut graph.visual_mut(id).transform;
        if t.center_point.is_some()
            && t.scale.is_none()
            && t.rotation_degrees.is_none()
            && !scale_animated
            && !rotation_animated
        {
            t.center_point = None;
            t.rotation_axis = None;
            progress = true;
        }
        if t.rotation_axis.is_some() && t.rotation_degrees.is_none() && !rotation_animated {
            t.rotation_axis = None;
            progress = true;
        }
    }

    if !graph.animators(id).is_empty() {
        return progress;
    }

    let t = &graph.visual(id).transform;
    if let Some(axis) = t.rotation_axis
        && !axis.approx_eq(Vector3::Z_AXIS)
    {
        return progress;
    }
    // Out-of-plane components cannot be folded into a planar matrix.
    if t.center_point.is_some_and(|c| c.z != 0.0)
        || t.offset.is_some_and(|o| o.z != 0.0)
        || t.scale.is_some_and(|s| s.z != 1.0)
    {
        return progress;
    }
    if t.center_point.is_none()
        && t.offset.is_none()
        && t.rotation_degrees.is_none()
        && t.scale.is_none()
    {
        return progress;
    }

    let center = t.center_point.map_or(Vec2::ZERO, Vector3::xy);
    let mut combined = t.transform_matrix.unwrap_or(Affine::IDENTITY);
    if let Some(offset) = t.offset {
        combined = Affine::translate(offset.xy()) * combined;
    }
    if let Some(degrees) = t.rotation_degrees {
        combined = rotate_about_degrees(degrees, center) * combined;
    }
    if let Some(scale) = t.scale {
        combined = scale_about(scale.xy(), center) * combined;
    }

    let t = &mut graph.visual_mut(id).transform;
    t.center_point = None;
    t.offset = None;
    t.rotation_degrees = None;
    t.rotation_axis = None;
    t.scale = None;
    t.transform_matrix = if affine_is_identity(combined) {
        None
    } else {
        Some(combined)
    };
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{Point, affine_approx_eq};
    use crate::graph::{
        ContainerShape, KeyFrameAnimation, KeyFrames, SpriteShape, Visual,
    };

    fn shape_graph() -> (Graph, NodeId) {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let s = g.alloc(NodeKind::ContainerShape(ContainerShape::default()));
        // Attach through a shape visual so the shape is live.
        let sv = g.alloc(NodeKind::ShapeVisual(crate::graph::ShapeVisual {
            visual: Visual::default(),
            view_box: None,
            shapes: vec![s],
        }));
        g.child_visuals_mut(g.root()).push(sv);
        (g, s)
    }

    #[test]
    fn folds_scale_rotation_offset_about_center_into_matrix() {
        let (mut g, s) = shape_graph();
        {
            let t = g.shape_transform_mut(s);
            t.center_point = Some(Vec2::new(10.0, 10.0));
            t.scale = Some(Vec2::new(2.0, 2.0));
            t.rotation_degrees = Some(90.0);
            t.offset = Some(Vec2::new(5.0, 0.0));
        }

        assert!(simplify_properties(&mut g));

        let t = g.shape_transform(s);
        assert!(t.center_point.is_none());
        assert!(t.scale.is_none());
        assert!(t.rotation_degrees.is_none());
        assert!(t.offset.is_none());

        // The offset applies first, then rotation, then scale.
        let expected = scale_about(Vec2::new(2.0, 2.0), Vec2::new(10.0, 10.0))
            * rotate_about_degrees(90.0, Vec2::new(10.0, 10.0))
            * Affine::translate(Vec2::new(5.0, 0.0));
        assert!(affine_approx_eq(t.transform_matrix.unwrap(), expected));
    }

    #[test]
    fn clears_inert_center_point() {
        let (mut g, s) = shape_graph();
        g.shape_transform_mut(s).center_point = Some(Vec2::new(3.0, 4.0));

        assert!(simplify_properties(&mut g));
        assert!(g.shape_transform(s).center_point.is_none());
        assert!(g.shape_transform(s).transform_matrix.is_none());
    }

    #[test]
    fn never_folds_into_an_animated_node() {
        let (mut g, s) = shape_graph();
        g.shape_transform_mut(s).offset = Some(Vec2::new(5.0, 0.0));
        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(
            KeyFrames::new(),
        )));
        g.start_animation(s, "Scale", anim);

        simplify_properties(&mut g);
        assert!(g.shape_transform(s).offset.is_some());
        assert!(g.shape_transform(s).transform_matrix.is_none());
    }

    #[test]
    fn keeps_center_point_while_scale_is_animated() {
        let (mut g, s) = shape_graph();
        g.shape_transform_mut(s).center_point = Some(Vec2::new(1.0, 1.0));
        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(
            KeyFrames::new(),
        )));
        g.start_animation(s, "Scale", anim);

        simplify_properties(&mut g);
        assert!(g.shape_transform(s).center_point.is_some());
    }

    #[test]
    fn skips_non_z_rotation_axis() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let v = g.alloc(NodeKind::ContainerVisual(Visual::default()));
        g.child_visuals_mut(g.root()).push(v);
        {
            let t = &mut g.visual_mut(v).transform;
            t.rotation_degrees = Some(45.0);
            t.rotation_axis = Some(Vector3::new(0.0, 1.0, 0.0));
        }

        simplify_properties(&mut g);
        let t = &g.visual(v).transform;
        assert_eq!(t.rotation_degrees, Some(45.0));
        assert!(t.transform_matrix.is_none());
    }

    #[test]
    fn visual_fold_accepts_explicit_z_axis() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let v = g.alloc(NodeKind::ContainerVisual(Visual::default()));
        g.child_visuals_mut(g.root()).push(v);
        {
            let t = &mut g.visual_mut(v).transform;
            t.rotation_degrees = Some(180.0);
            t.rotation_axis = Some(Vector3::Z_AXIS);
        }

        assert!(simplify_properties(&mut g));
        let t = &g.visual(v).transform;
        assert!(t.rotation_degrees.is_none());
        assert!(t.rotation_axis.is_none());
        let m = t.transform_matrix.unwrap();
        let p = m * Point::new(1.0, 0.0);
        assert!((p.x + 1.0).abs() < 1e-9);
    }

    #[test]
    fn already_canonical_matrix_is_a_no_op() {
        let (mut g, s) = shape_graph();
        g.shape_transform_mut(s).transform_matrix = Some(Affine::translate(Vec2::new(2.0, 3.0)));

        assert!(!simplify_properties(&mut g));
        assert_eq!(
            g.shape_transform(s).transform_matrix,
            Some(Affine::translate(Vec2::new(2.0, 3.0)))
        );
    }

    #[test]
    fn pure_identity_fold_clears_all_slots() {
        let (mut g, s) = shape_graph();
        {
            let t = g.shape_transform_mut(s);
            t.offset = Some(Vec2::ZERO);
            t.scale = Some(Vec2::new(1.0, 1.0));
        }

        assert!(simplify_properties(&mut g));
        let t = g.shape_transform(s);
        assert!(t.offset.is_none());
        assert!(t.scale.is_none());
        assert!(t.transform_matrix.is_none());
    }

    #[test]
    fn sprite_shapes_simplify_too() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let s = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let sv = g.alloc(NodeKind::ShapeVisual(crate::graph::ShapeVisual {
            visual: Visual::default(),
            view_box: None,
            shapes: vec![s],
        }));
        g.child_visuals_mut(g.root()).push(sv);
        g.shape_transform_mut(s).offset = Some(Vec2::new(7.0, 0.0));

        assert!(simplify_properties(&mut g));
        let t = g.shape_transform(s);
        assert!(t.offset.is_none());
        assert!(affine_approx_eq(
            t.transform_matrix.unwrap(),
            Affine::translate(Vec2::new(7.0, 0.0))
        ));
    }
}
