//! The parsed BodyMovin document.
//!
//! These are the validated types the translator consumes. The serde-facing
//! raw representation lives in [`super::parse`]; required header fields have
//! already been checked by the time a [`LottieComposition`] exists.

use crate::foundation::core::{BezPath, Color, Vec2};

/// An animatable document value: a bare static value or a keyframe track.
#[derive(Debug, Clone, PartialEq)]
pub enum Animatable<T> {
    Static(T),
    Animated(Vec<DocKeyFrame<T>>),
}

impl<T> Animatable<T> {
    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated(_))
    }

    /// The value at the start of the timeline.
    pub fn initial(&self) -> Option<&T> {
        match self {
            Self::Static(v) => Some(v),
            Self::Animated(frames) => frames.first().map(|f| &f.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocKeyFrame<T> {
    /// Absolute frame number.
    pub frame: f64,
    pub value: T,
    pub easing: DocEasing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocEasing {
    Linear,
    Hold,
    Bezier {
        out_tangent: Vec2,
        in_tangent: Vec2,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub frame: f64,
    pub duration_frames: f64,
}

#[derive(Debug, Clone)]
pub enum Asset {
    PreComp { id: String, layers: Vec<Layer> },
    Image { id: String },
}

impl Asset {
    pub fn id(&self) -> &str {
        match self {
            Self::PreComp { id, .. } | Self::Image { id } => id,
        }
    }
}

/// Per-layer transform track (`ks`).
#[derive(Debug, Clone)]
pub struct LayerTransform {
    pub anchor: Animatable<Vec2>,
    pub position: Animatable<Vec2>,
    /// Percent; `(100, 100)` is identity.
    pub scale: Animatable<Vec2>,
    pub rotation_degrees: Animatable<f64>,
    /// Percent; `100` is opaque.
    pub opacity_percent: Animatable<f64>,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            anchor: Animatable::Static(Vec2::ZERO),
            position: Animatable::Static(Vec2::ZERO),
            scale: Animatable::Static(Vec2::new(100.0, 100.0)),
            rotation_degrees: Animatable::Static(0.0),
            opacity_percent: Animatable::Static(100.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerBase {
    pub index: Option<u32>,
    pub parent: Option<u32>,
    pub name: Option<String>,
    pub in_point: f64,
    pub out_point: f64,
    pub start_time: f64,
    pub transform: LayerTransform,
}

#[derive(Debug, Clone)]
pub enum Layer {
    PreComp(PreCompLayer),
    Solid(SolidLayer),
    Null(NullLayer),
    Shape(ShapeLayer),
}

impl Layer {
    pub fn base(&self) -> &LayerBase {
        match self {
            Self::PreComp(l) => &l.base,
            Self::Solid(l) => &l.base,
            Self::Null(l) => &l.base,
            Self::Shape(l) => &l.base,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreCompLayer {
    pub base: LayerBase,
    pub ref_id: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct SolidLayer {
    pub base: LayerBase,
    pub color: Color,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct NullLayer {
    pub base: LayerBase,
}

#[derive(Debug, Clone)]
pub struct ShapeLayer {
    pub base: LayerBase,
    pub items: Vec<ShapeItem>,
}

/// One item in a shape layer's (or group's) item list.
#[derive(Debug, Clone)]
pub enum ShapeItem {
    Group(ShapeGroup),
    Rectangle(RectangleItem),
    Ellipse(EllipseItem),
    Path(PathItem),
    Fill(FillItem),
    Stroke(StrokeItem),
    Transform(GroupTransform),
    TrimPath(TrimPathItem),
}

#[derive(Debug, Clone)]
pub struct ShapeGroup {
    pub name: Option<String>,
    pub items: Vec<ShapeItem>,
}

#[derive(Debug, Clone)]
pub struct RectangleItem {
    pub position: Animatable<Vec2>,
    pub size: Animatable<Vec2>,
    pub corner_radius: Animatable<f64>,
}

#[derive(Debug, Clone)]
pub struct EllipseItem {
    pub position: Animatable<Vec2>,
    pub size: Animatable<Vec2>,
}

#[derive(Debug, Clone)]
pub struct PathItem {
    pub path: Animatable<BezPath>,
}

#[derive(Debug, Clone)]
pub struct FillItem {
    pub color: Animatable<Color>,
    pub opacity_percent: Animatable<f64>,
}

#[derive(Debug, Clone)]
pub struct StrokeItem {
    pub color: Animatable<Color>,
    pub opacity_percent: Animatable<f64>,
    pub width: Animatable<f64>,
    pub line_cap: u8,
    pub line_join: u8,
    pub miter_limit: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TrimPathItem {
    /// Percent.
    pub start: Animatable<f64>,
    /// Percent.
    pub end: Animatable<f64>,
    /// Degrees; one full turn is 360.
    pub offset: Animatable<f64>,
}

/// A group's inline transform (`tr` item).
#[derive(Debug, Clone, Default)]
pub struct GroupTransform {
    pub transform: LayerTransform,
}

/// A whole parsed document.
#[derive(Debug, Clone)]
pub struct LottieComposition {
    pub version: String,
    pub name: Option<String>,
    pub width: f64,
    pub height: f64,
    pub in_point: f64,
    pub out_point: f64,
    pub frame_rate: f64,
    pub is_3d: bool,
    pub markers: Vec<Marker>,
    pub assets: Vec<Asset>,
    pub layers: Vec<Layer>,
}

impl LottieComposition {
    pub fn duration_frames(&self) -> f64 {
        (self.out_point - self.in_point).max(0.0)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id() == id)
    }
}
