//! Animation bindings.
//!
//! An [`Animator`] binds one animatable property name on its owning node to
//! an animation node (keyframe or expression) plus an optional controller.
//! Controllers carry their own animators, which is how a keyframe animation's
//! progress gets driven by an expression over the composition progress.

use super::NodeId;
use crate::foundation::core::{BezPath, Color, Vec2, Vector3, Vector4};

/// Easing applied over the interval ending at a keyframe.
#[derive(Debug, Clone, PartialEq)]
pub enum Easing {
    Linear,
    CubicBezier {
        control_point_1: Vec2,
        control_point_2: Vec2,
    },
    /// Jump to the keyframe value at the end of the interval.
    Step,
    /// Hold the previous value for the whole interval.
    Hold,
}

impl Easing {
    /// Step and hold easings never interpolate, which is what makes a scale
    /// animation a candidate for visibility rewriting.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Step | Self::Hold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyFrameValue<T> {
    Value(T),
    /// An expression evaluated at the keyframe's progress.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrame<T> {
    /// Normalized progress in `0..=1`.
    pub progress: f64,
    pub value: KeyFrameValue<T>,
    pub easing: Easing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFrames<T> {
    pub frames: Vec<KeyFrame<T>>,
}

impl<T> KeyFrames<T> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn insert_value(&mut self, progress: f64, value: T, easing: Easing) {
        self.frames.push(KeyFrame {
            progress,
            value: KeyFrameValue::Value(value),
            easing,
        });
    }

    pub fn insert_expression(&mut self, progress: f64, expression: impl Into<String>, easing: Easing) {
        self.frames.push(KeyFrame {
            progress,
            value: KeyFrameValue::Expression(expression.into()),
            easing,
        });
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A keyframed animation, typed over the animated value lane.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyFrameAnimation {
    Scalar(KeyFrames<f64>),
    Vector2(KeyFrames<Vec2>),
    Vector3(KeyFrames<Vector3>),
    Vector4(KeyFrames<Vector4>),
    Color(KeyFrames<Color>),
    Path(KeyFrames<BezPath>),
    Boolean(KeyFrames<bool>),
}

impl KeyFrameAnimation {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "Scalar",
            Self::Vector2(_) => "Vector2",
            Self::Vector3(_) => "Vector3",
            Self::Vector4(_) => "Vector4",
            Self::Color(_) => "Color",
            Self::Path(_) => "Path",
            Self::Boolean(_) => "Boolean",
        }
    }

    pub fn frame_count(&self) -> usize {
        match self {
            Self::Scalar(k) => k.len(),
            Self::Vector2(k) => k.len(),
            Self::Vector3(k) => k.len(),
            Self::Vector4(k) => k.len(),
            Self::Color(k) => k.len(),
            Self::Path(k) => k.len(),
            Self::Boolean(k) => k.len(),
        }
    }
}

/// An expression-driven animation with named reference parameters.
///
/// References are non-owning edges into the graph; the [`GraphIndex`]
/// records them as in-references of the referenced node.
///
/// [`GraphIndex`]: super::index::GraphIndex
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionAnimation {
    pub expression: String,
    pub references: Vec<(String, NodeId)>,
}

impl ExpressionAnimation {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            references: Vec::new(),
        }
    }

    pub fn set_reference_parameter(&mut self, name: impl Into<String>, target: NodeId) {
        self.references.push((name.into(), target));
    }

    pub fn reference(&self, name: &str) -> Option<NodeId> {
        self.references
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, id)| id)
    }
}

/// Controls playback of the animation it is attached to.
#[derive(Debug, Clone, Default)]
pub struct AnimationController {
    pub paused: bool,
    /// Animators on the controller itself (typically one binding `Progress`).
    pub animators: Vec<Animator>,
}

/// Binds `target_property` on the owning node to an animation node.
#[derive(Debug, Clone)]
pub struct Animator {
    pub target_property: String,
    pub animation: NodeId,
    pub controller: Option<AnimationController>,
}
