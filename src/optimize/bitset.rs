//! Property bitsets and the orthogonality predicate.
//!
//! `set(n)` in the rewrite rules is a [`PropertyMask`]: one bit per property
//! that is non-default or animated on a node. Animator target names map
//! through [`property_id_from_name`]; names outside the table map to
//! [`PropertyMask::UNKNOWN`], which vetoes every orthogonality check.

use std::ops::BitOr;

use crate::graph::{Graph, NodeId, NodeKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PropertyMask(u32);

impl PropertyMask {
    pub(crate) const EMPTY: Self = Self(0);
    pub(crate) const BORDER_MODE: Self = Self(1 << 0);
    pub(crate) const CENTER_POINT: Self = Self(1 << 1);
    pub(crate) const CLIP: Self = Self(1 << 2);
    pub(crate) const COLOR: Self = Self(1 << 3);
    pub(crate) const IS_VISIBLE: Self = Self(1 << 4);
    pub(crate) const OFFSET: Self = Self(1 << 5);
    pub(crate) const OPACITY: Self = Self(1 << 6);
    pub(crate) const PATH: Self = Self(1 << 7);
    pub(crate) const PROGRESS: Self = Self(1 << 8);
    pub(crate) const ROTATION: Self = Self(1 << 9);
    pub(crate) const SCALE: Self = Self(1 << 10);
    pub(crate) const SIZE: Self = Self(1 << 11);
    pub(crate) const TRANSFORM_MATRIX: Self = Self(1 << 12);
    pub(crate) const TRIM_START: Self = Self(1 << 13);
    pub(crate) const TRIM_END: Self = Self(1 << 14);
    pub(crate) const TRIM_OFFSET: Self = Self(1 << 15);
    pub(crate) const UNKNOWN: Self = Self(1 << 16);

    pub(crate) fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub(crate) fn has_unknown(self) -> bool {
        self.intersects(Self::UNKNOWN)
    }
}

impl BitOr for PropertyMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Map an animator target-property name to its property id.
pub(crate) fn property_id_from_name(name: &str) -> PropertyMask {
    match name {
        "BorderMode" => PropertyMask::BORDER_MODE,
        "CenterPoint" => PropertyMask::CENTER_POINT,
        "Clip" => PropertyMask::CLIP,
        "Color" => PropertyMask::COLOR,
        "IsVisible" => PropertyMask::IS_VISIBLE,
        "Offset" | "Position" => PropertyMask::OFFSET,
        "Opacity" => PropertyMask::OPACITY,
        "Path" => PropertyMask::PATH,
        "Progress" => PropertyMask::PROGRESS,
        "RotationAngleInDegrees" => PropertyMask::ROTATION,
        "Scale" => PropertyMask::SCALE,
        "Size" => PropertyMask::SIZE,
        "TransformMatrix" => PropertyMask::TRANSFORM_MATRIX,
        "TrimStart" => PropertyMask::TRIM_START,
        "TrimEnd" => PropertyMask::TRIM_END,
        "TrimOffset" => PropertyMask::TRIM_OFFSET,
        _ => PropertyMask::UNKNOWN,
    }
}

/// `set(n)`: non-default property slots plus animated property names.
pub(crate) fn node_property_mask(graph: &Graph, id: NodeId) -> PropertyMask {
    let mut mask = PropertyMask::EMPTY;

    match graph.kind(id) {
        NodeKind::ContainerVisual(_) | NodeKind::ShapeVisual(_) | NodeKind::SpriteVisual(_) => {
            let v = graph.visual(id);
            let t = &v.transform;
            if t.center_point.is_some() {
                mask = mask | PropertyMask::CENTER_POINT;
            }
            if t.offset.is_some() {
                mask = mask | PropertyMask::OFFSET;
            }
            if t.rotation_degrees.is_some() || t.rotation_axis.is_some() {
                mask = mask | PropertyMask::ROTATION;
            }
            if t.scale.is_some() {
                mask = mask | PropertyMask::SCALE;
            }
            if t.transform_matrix.is_some() {
                mask = mask | PropertyMask::TRANSFORM_MATRIX;
            }
            if v.size.is_some() {
                mask = mask | PropertyMask::SIZE;
            }
            if v.opacity.is_some() {
                mask = mask | PropertyMask::OPACITY;
            }
            if v.is_visible.is_some() {
                mask = mask | PropertyMask::IS_VISIBLE;
            }
            if v.clip.is_some() {
                mask = mask | PropertyMask::CLIP;
            }
            if v.border_mode.is_some() {
                mask = mask | PropertyMask::BORDER_MODE;
            }
        }
        NodeKind::ContainerShape(_) | NodeKind::SpriteShape(_) => {
            let t = graph.shape_transform(id);
            if t.center_point.is_some() {
                mask = mask | PropertyMask::CENTER_POINT;
            }
            if t.offset.is_some() {
                mask = mask | PropertyMask::OFFSET;
            }
            if t.rotation_degrees.is_some() {
                mask = mask | PropertyMask::ROTATION;
            }
            if t.scale.is_some() {
                mask = mask | PropertyMask::SCALE;
            }
            if t.transform_matrix.is_some() {
                mask = mask | PropertyMask::TRANSFORM_MATRIX;
            }
        }
        _ => {}
    }

    for animator in graph.animators(id) {
        mask = mask | property_id_from_name(&animator.target_property);
    }

    mask
}

/// Whether a parent/child pair may be merged into a single node.
///
/// The sets must be disjoint, and none of the combinations that would flip
/// the transform evaluation order (TransformMatrix ↦ Offset ↦ Rotation ↦
/// Scale) may hold. Color, opacity, path, and border mode commute through
/// transforms.
pub(crate) fn are_orthogonal(parent: PropertyMask, child: PropertyMask) -> bool {
    if (parent.has_unknown() && !child.is_empty()) || (child.has_unknown() && !parent.is_empty()) {
        return false;
    }
    if parent.intersects(child) {
        return false;
    }

    // A child matrix never merges under a parent that sets anything
    // transform-ordered.
    if child.intersects(PropertyMask::TRANSFORM_MATRIX)
        && parent.intersects(
            PropertyMask::OFFSET
                | PropertyMask::ROTATION
                | PropertyMask::SCALE
                | PropertyMask::CLIP
                | PropertyMask::CENTER_POINT,
        )
    {
        return false;
    }

    if parent.intersects(PropertyMask::ROTATION)
        && child.intersects(PropertyMask::OFFSET | PropertyMask::CLIP)
    {
        return false;
    }

    if parent.intersects(PropertyMask::SCALE)
        && child.intersects(PropertyMask::OFFSET | PropertyMask::ROTATION | PropertyMask::CLIP)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ContainerShape, KeyFrameAnimation, KeyFrames, NodeKind, Visual};
    use crate::foundation::core::Vec2;

    #[test]
    fn unknown_animated_property_vetoes_orthogonality() {
        assert!(!are_orthogonal(
            PropertyMask::UNKNOWN,
            PropertyMask::OPACITY
        ));
        assert!(!are_orthogonal(
            PropertyMask::OPACITY,
            PropertyMask::UNKNOWN
        ));
        assert!(are_orthogonal(PropertyMask::UNKNOWN, PropertyMask::EMPTY));
    }

    #[test]
    fn order_violations_are_rejected() {
        // Scale on the parent, offset on the child.
        assert!(!are_orthogonal(PropertyMask::SCALE, PropertyMask::OFFSET));
        // Rotation on the parent, clip on the child.
        assert!(!are_orthogonal(PropertyMask::ROTATION, PropertyMask::CLIP));
        // Matrix on the child under a transforming parent.
        assert!(!are_orthogonal(
            PropertyMask::OFFSET,
            PropertyMask::TRANSFORM_MATRIX
        ));
    }

    #[test]
    fn commuting_properties_are_accepted() {
        assert!(are_orthogonal(PropertyMask::OPACITY, PropertyMask::OFFSET));
        assert!(are_orthogonal(PropertyMask::SCALE, PropertyMask::COLOR));
        // Offset on the parent composes fine outside a scaled child.
        assert!(are_orthogonal(PropertyMask::OFFSET, PropertyMask::SCALE));
    }

    #[test]
    fn mask_derivation_covers_slots_and_animators() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let shape = g.alloc(NodeKind::ContainerShape(ContainerShape::default()));
        g.shape_transform_mut(shape).offset = Some(Vec2::new(1.0, 0.0));

        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(
            KeyFrames::new(),
        )));
        g.start_animation(shape, "Scale", anim);

        let mask = node_property_mask(&g, shape);
        assert!(mask.contains(PropertyMask::OFFSET));
        assert!(mask.contains(PropertyMask::SCALE));
        assert!(!mask.intersects(PropertyMask::ROTATION));
    }

    #[test]
    fn unnamed_property_maps_to_unknown() {
        assert_eq!(property_id_from_name("Wobble"), PropertyMask::UNKNOWN);
    }
}
