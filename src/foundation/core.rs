//! Core geometry and value types shared across the document, graph, and
//! optimizer layers.
//!
//! Planar geometry comes from `kurbo`. Visual transform slots are nominally
//! 3-D in the source dialect, so a small [`Vector3`] lives here; matrices are
//! always planar ([`Affine`]) because the optimizer never folds a rotation
//! about a non-Z axis.

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Comparison tolerance for matrix and scalar equivalence checks.
pub(crate) const EPSILON: f64 = 1.0e-9;

/// A 3-component vector for visual transform slots.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    /// The positive Z axis, the only rotation axis the planar IR can fold.
    pub const Z_AXIS: Self = Self::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Lift a planar vector, leaving `z` at zero.
    pub fn from_xy(v: Vec2) -> Self {
        Self::new(v.x, v.y, 0.0)
    }

    /// The planar part of the vector.
    pub fn xy(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn approx_eq(self, other: Self) -> bool {
        (self.x - other.x).abs() <= EPSILON
            && (self.y - other.y).abs() <= EPSILON
            && (self.z - other.z).abs() <= EPSILON
    }
}

/// A 4-component vector (color channels, 4-D keyframe lanes).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector4 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Vector4 {
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }
}

/// Non-premultiplied color with `0..=1` channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub a: f64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(a: f64, r: f64, g: f64, b: f64) -> Self {
        Self { a, r, g, b }
    }

    /// A fully transparent brush color draws nothing regardless of RGB.
    pub fn is_transparent(self) -> bool {
        self.a <= 0.0
    }
}

/// Non-uniform scale about a center point.
pub fn scale_about(scale: Vec2, center: Vec2) -> Affine {
    Affine::translate(center) * Affine::scale_non_uniform(scale.x, scale.y) * Affine::translate(-center)
}

/// Rotation (degrees, clockwise-positive in composition space) about a center
/// point.
pub fn rotate_about_degrees(degrees: f64, center: Vec2) -> Affine {
    Affine::rotate_about(degrees.to_radians(), center.to_point())
}

pub fn affine_approx_eq(a: Affine, b: Affine) -> bool {
    let ca = a.as_coeffs();
    let cb = b.as_coeffs();
    ca.iter().zip(cb.iter()).all(|(x, y)| (x - y).abs() <= EPSILON)
}

pub fn affine_is_identity(a: Affine) -> bool {
    affine_approx_eq(a, Affine::IDENTITY)
}
