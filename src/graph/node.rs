//! Node payloads for the composition graph.
//!
//! The source dialect's class hierarchy is flattened into [`NodeKind`], one
//! tagged variant per node kind, with the shared transform state embedded as
//! a small struct in each relevant payload.

use super::NodeId;
use crate::foundation::core::{Affine, BezPath, Color, Vec2, Vector3, Vector4};

/// Transform slots carried by every visual. `None` means default.
///
/// Matrices are planar; `rotation_axis` exists only to guard folding (a
/// non-Z axis blocks the property simplifier).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualTransform {
    pub center_point: Option<Vector3>,
    pub offset: Option<Vector3>,
    pub rotation_degrees: Option<f64>,
    pub rotation_axis: Option<Vector3>,
    pub scale: Option<Vector3>,
    pub transform_matrix: Option<Affine>,
}

/// Transform slots carried by every shape (2-D).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeTransform {
    pub center_point: Option<Vec2>,
    pub offset: Option<Vec2>,
    pub rotation_degrees: Option<f64>,
    pub scale: Option<Vec2>,
    pub transform_matrix: Option<Affine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    Inherit,
    Soft,
    Hard,
}

/// State common to the three visual kinds.
#[derive(Debug, Clone, Default)]
pub struct Visual {
    pub transform: VisualTransform,
    pub size: Option<Vec2>,
    pub opacity: Option<f64>,
    pub is_visible: Option<bool>,
    /// Owned clip node (`InsetClip` or `GeometricClip`).
    pub clip: Option<NodeId>,
    pub border_mode: Option<BorderMode>,
    /// Owned child visuals, painted in order.
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ShapeVisual {
    pub visual: Visual,
    pub view_box: Option<ViewBox>,
    /// Owned root shapes, painted in order.
    pub shapes: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SpriteVisual {
    pub visual: Visual,
    pub brush: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct ContainerShape {
    pub transform: ShapeTransform,
    pub shapes: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    Flat,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Bevel,
    Round,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeStyle {
    pub thickness: Option<f64>,
    pub miter_limit: Option<f64>,
    pub start_cap: Option<CapStyle>,
    pub end_cap: Option<CapStyle>,
    pub dash_cap: Option<CapStyle>,
    pub line_join: Option<LineJoin>,
    pub dash_offset: Option<f64>,
    pub dash_array: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SpriteShape {
    pub transform: ShapeTransform,
    pub geometry: Option<NodeId>,
    pub fill_brush: Option<NodeId>,
    pub stroke_brush: Option<NodeId>,
    pub stroke: StrokeStyle,
}

/// Trim slots shared by every geometry kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryTrim {
    pub trim_start: Option<f64>,
    pub trim_end: Option<f64>,
    pub trim_offset: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PathGeometry {
    pub trim: GeometryTrim,
    pub path: BezPath,
}

#[derive(Debug, Clone)]
pub struct EllipseGeometry {
    pub trim: GeometryTrim,
    pub center: Vec2,
    pub radius: Vec2,
}

#[derive(Debug, Clone)]
pub struct RectangleGeometry {
    pub trim: GeometryTrim,
    pub offset: Option<Vec2>,
    pub size: Vec2,
}

#[derive(Debug, Clone)]
pub struct RoundedRectangleGeometry {
    pub trim: GeometryTrim,
    pub offset: Option<Vec2>,
    pub size: Vec2,
    pub corner_radius: Vec2,
}

#[derive(Debug, Clone, Default)]
pub struct ColorBrush {
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Default)]
pub struct EffectBrush {
    /// Named source brushes, owned.
    pub sources: Vec<(String, NodeId)>,
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceBrush {
    /// Owned `VisualSurface` node.
    pub surface: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsetClip {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub center_point: Option<Vec2>,
    pub scale: Option<Vec2>,
}

impl InsetClip {
    /// A zero-inset clip with default center and scale clips nothing beyond
    /// the visual's own size.
    pub fn is_zero(&self) -> bool {
        self.top == 0.0
            && self.left == 0.0
            && self.right == 0.0
            && self.bottom == 0.0
            && self.center_point.is_none()
            && self.scale.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeometricClip {
    /// Owned geometry node.
    pub geometry: Option<NodeId>,
}

/// A surface whose content is another visual's subtree.
///
/// `source_visual` is a non-owning reference; the runtime ignores the
/// source's own transform slots, which is why the optimizer must never hoist
/// properties across a surface source.
#[derive(Debug, Clone, Default)]
pub struct VisualSurface {
    pub source_visual: Option<NodeId>,
    pub source_size: Option<Vec2>,
    pub source_offset: Option<Vec2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewBox {
    pub size: Vec2,
    pub offset: Option<Vec2>,
}

/// A typed value held in a [`PropertySet`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(f64),
    Vector2(Vec2),
    Vector3(Vector3),
    Vector4(Vector4),
    Color(Color),
    Boolean(bool),
}

/// Name → typed value map carried by every node, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertySet {
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn insert_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.insert(name, PropertyValue::Scalar(value));
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Move every entry out of `other` into `self`.
    pub fn merge_from(&mut self, other: &mut PropertySet) {
        for (name, value) in other.entries.drain(..) {
            self.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_inset_clip_detection() {
        assert!(InsetClip::default().is_zero());

        let mut c = InsetClip::default();
        c.right = 1.0;
        assert!(!c.is_zero());

        let mut c = InsetClip::default();
        c.scale = Some(Vec2::new(1.0, 1.0));
        assert!(!c.is_zero());
    }

    #[test]
    fn property_set_replaces_on_duplicate_name() {
        let mut p = PropertySet::default();
        p.insert_scalar("Progress", 0.0);
        p.insert_scalar("Progress", 0.5);
        assert_eq!(p.len(), 1);
        assert_eq!(p.get("Progress"), Some(&PropertyValue::Scalar(0.5)));
    }
}
