//! The composition graph: an arena of tagged nodes keyed by stable handles.
//!
//! Owning edges (child lists, clips, brushes, geometries, animations bound
//! through animators) form a tree rooted at [`Graph::root`]. Non-owning
//! edges (expression-animation references, visual-surface sources) overlay
//! that tree and are only ever followed through the [`index::GraphIndex`].
//!
//! Asking a node for state its kind does not carry is a programmer error and
//! fails fast.

pub mod animator;
pub mod index;
pub mod node;

pub use animator::{
    AnimationController, Animator, Easing, ExpressionAnimation, KeyFrame, KeyFrameAnimation,
    KeyFrameValue, KeyFrames,
};
pub use node::{
    BorderMode, CapStyle, ColorBrush, ContainerShape, EffectBrush, EllipseGeometry, GeometricClip,
    GeometryTrim, InsetClip, LineJoin, PathGeometry, PropertySet, PropertyValue,
    RectangleGeometry, RoundedRectangleGeometry, ShapeTransform, ShapeVisual, SpriteShape,
    SpriteVisual, StrokeStyle, SurfaceBrush, ViewBox, Visual, VisualSurface, VisualTransform,
};

/// Stable handle into a [`Graph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A composition node: its kind-specific payload plus the state every node
/// carries (author metadata, property set, animators).
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub properties: PropertySet,
    pub animators: Vec<Animator>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            short_description: None,
            long_description: None,
            properties: PropertySet::default(),
            animators: Vec::new(),
        }
    }
}

/// Tagged node variants.
#[derive(Debug, Clone)]
pub enum NodeKind {
    ContainerVisual(Visual),
    ShapeVisual(ShapeVisual),
    SpriteVisual(SpriteVisual),
    ContainerShape(ContainerShape),
    SpriteShape(SpriteShape),
    PathGeometry(PathGeometry),
    EllipseGeometry(EllipseGeometry),
    RectangleGeometry(RectangleGeometry),
    RoundedRectangleGeometry(RoundedRectangleGeometry),
    ColorBrush(ColorBrush),
    EffectBrush(EffectBrush),
    SurfaceBrush(SurfaceBrush),
    InsetClip(InsetClip),
    GeometricClip(GeometricClip),
    ExpressionAnimation(ExpressionAnimation),
    KeyFrameAnimation(KeyFrameAnimation),
    VisualSurface(VisualSurface),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContainerVisual(_) => "ContainerVisual",
            Self::ShapeVisual(_) => "ShapeVisual",
            Self::SpriteVisual(_) => "SpriteVisual",
            Self::ContainerShape(_) => "ContainerShape",
            Self::SpriteShape(_) => "SpriteShape",
            Self::PathGeometry(_) => "PathGeometry",
            Self::EllipseGeometry(_) => "EllipseGeometry",
            Self::RectangleGeometry(_) => "RectangleGeometry",
            Self::RoundedRectangleGeometry(_) => "RoundedRectangleGeometry",
            Self::ColorBrush(_) => "ColorBrush",
            Self::EffectBrush(_) => "EffectBrush",
            Self::SurfaceBrush(_) => "SurfaceBrush",
            Self::InsetClip(_) => "InsetClip",
            Self::GeometricClip(_) => "GeometricClip",
            Self::ExpressionAnimation(_) => "ExpressionAnimation",
            Self::KeyFrameAnimation(_) => "KeyFrameAnimation",
            Self::VisualSurface(_) => "VisualSurface",
        }
    }

    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            Self::ContainerVisual(_) | Self::ShapeVisual(_) | Self::SpriteVisual(_)
        )
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, Self::ContainerShape(_) | Self::SpriteShape(_))
    }
}

/// Arena of composition nodes plus the tree root.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Graph {
    /// Create a graph whose root is a new node of the given kind.
    pub fn with_root(kind: NodeKind) -> Self {
        Self {
            nodes: vec![Node::new(kind)],
            root: NodeId(0),
        }
    }

    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node arena overflow"));
        self.nodes.push(Node::new(kind));
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.node_mut(id).kind
    }

    /// Total number of allocated arena slots, live or not.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Shared visual state of a visual-kind node.
    pub fn visual(&self, id: NodeId) -> &Visual {
        match self.kind(id) {
            NodeKind::ContainerVisual(v) => v,
            NodeKind::ShapeVisual(s) => &s.visual,
            NodeKind::SpriteVisual(s) => &s.visual,
            other => panic!("visual(): {} carries no visual state", other.name()),
        }
    }

    pub fn visual_mut(&mut self, id: NodeId) -> &mut Visual {
        match self.kind_mut(id) {
            NodeKind::ContainerVisual(v) => v,
            NodeKind::ShapeVisual(s) => &mut s.visual,
            NodeKind::SpriteVisual(s) => &mut s.visual,
            other => panic!("visual_mut(): {} carries no visual state", other.name()),
        }
    }

    /// 2-D transform slots of a shape-kind node.
    pub fn shape_transform(&self, id: NodeId) -> &ShapeTransform {
        match self.kind(id) {
            NodeKind::ContainerShape(c) => &c.transform,
            NodeKind::SpriteShape(s) => &s.transform,
            other => panic!("shape_transform(): {} carries no shape state", other.name()),
        }
    }

    pub fn shape_transform_mut(&mut self, id: NodeId) -> &mut ShapeTransform {
        match self.kind_mut(id) {
            NodeKind::ContainerShape(c) => &mut c.transform,
            NodeKind::SpriteShape(s) => &mut s.transform,
            other => panic!(
                "shape_transform_mut(): {} carries no shape state",
                other.name()
            ),
        }
    }

    /// Child visuals of a visual-kind node.
    pub fn child_visuals(&self, id: NodeId) -> &Vec<NodeId> {
        &self.visual(id).children
    }

    pub fn child_visuals_mut(&mut self, id: NodeId) -> &mut Vec<NodeId> {
        &mut self.visual_mut(id).children
    }

    /// Child shapes of a shape container (`ContainerShape` or `ShapeVisual`).
    pub fn child_shapes(&self, id: NodeId) -> &Vec<NodeId> {
        match self.kind(id) {
            NodeKind::ContainerShape(c) => &c.shapes,
            NodeKind::ShapeVisual(s) => &s.shapes,
            other => panic!("child_shapes(): {} owns no shape list", other.name()),
        }
    }

    pub fn child_shapes_mut(&mut self, id: NodeId) -> &mut Vec<NodeId> {
        match self.kind_mut(id) {
            NodeKind::ContainerShape(c) => &mut c.shapes,
            NodeKind::ShapeVisual(s) => &mut s.shapes,
            other => panic!("child_shapes_mut(): {} owns no shape list", other.name()),
        }
    }

    pub fn animators(&self, id: NodeId) -> &[Animator] {
        &self.node(id).animators
    }

    pub fn properties(&self, id: NodeId) -> &PropertySet {
        &self.node(id).properties
    }

    pub fn properties_mut(&mut self, id: NodeId) -> &mut PropertySet {
        &mut self.node_mut(id).properties
    }

    /// Bind `property` on `id` to an animation node with no controller.
    pub fn start_animation(&mut self, id: NodeId, property: impl Into<String>, animation: NodeId) {
        self.node_mut(id).animators.push(Animator {
            target_property: property.into(),
            animation,
            controller: None,
        });
    }

    /// Bind `property` on `id` to an animation node under a controller.
    pub fn start_controlled_animation(
        &mut self,
        id: NodeId,
        property: impl Into<String>,
        animation: NodeId,
        controller: AnimationController,
    ) {
        self.node_mut(id).animators.push(Animator {
            target_property: property.into(),
            animation,
            controller: Some(controller),
        });
    }

    /// Remove the first animator binding `property` on `id`, if any.
    pub fn stop_animation(&mut self, id: NodeId, property: &str) -> Option<Animator> {
        let animators = &mut self.node_mut(id).animators;
        let pos = animators.iter().position(|a| a.target_property == property)?;
        Some(animators.remove(pos))
    }

    /// Whether any animator on `id` targets `property`.
    pub fn is_animated(&self, id: NodeId, property: &str) -> bool {
        self.animators(id).iter().any(|a| a.target_property == property)
    }

    /// Visit every owned edge out of `id` exactly once.
    ///
    /// This is the walk the graph index and the live-node count use; it never
    /// follows expression references or visual-surface sources.
    pub fn for_each_owned_child(&self, id: NodeId, f: &mut impl FnMut(NodeId)) {
        match self.kind(id) {
            NodeKind::ContainerVisual(v) => {
                if let Some(clip) = v.clip {
                    f(clip);
                }
                for &c in &v.children {
                    f(c);
                }
            }
            NodeKind::ShapeVisual(s) => {
                if let Some(clip) = s.visual.clip {
                    f(clip);
                }
                for &c in &s.visual.children {
                    f(c);
                }
                for &sh in &s.shapes {
                    f(sh);
                }
            }
            NodeKind::SpriteVisual(s) => {
                if let Some(clip) = s.visual.clip {
                    f(clip);
                }
                for &c in &s.visual.children {
                    f(c);
                }
                if let Some(b) = s.brush {
                    f(b);
                }
            }
            NodeKind::ContainerShape(c) => {
                for &sh in &c.shapes {
                    f(sh);
                }
            }
            NodeKind::SpriteShape(s) => {
                if let Some(g) = s.geometry {
                    f(g);
                }
                if let Some(b) = s.fill_brush {
                    f(b);
                }
                if let Some(b) = s.stroke_brush {
                    f(b);
                }
            }
            NodeKind::GeometricClip(c) => {
                if let Some(g) = c.geometry {
                    f(g);
                }
            }
            NodeKind::EffectBrush(e) => {
                for &(_, src) in &e.sources {
                    f(src);
                }
            }
            NodeKind::SurfaceBrush(s) => {
                if let Some(surface) = s.surface {
                    f(surface);
                }
            }
            NodeKind::PathGeometry(_)
            | NodeKind::EllipseGeometry(_)
            | NodeKind::RectangleGeometry(_)
            | NodeKind::RoundedRectangleGeometry(_)
            | NodeKind::ColorBrush(_)
            | NodeKind::InsetClip(_)
            | NodeKind::ExpressionAnimation(_)
            | NodeKind::KeyFrameAnimation(_)
            | NodeKind::VisualSurface(_) => {}
        }

        visit_animator_animations(&self.node(id).animators, f);
    }

    /// All nodes reachable from the root along owned edges, preorder.
    pub fn collect_live(&self) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            out.push(id);
            let mut children = Vec::new();
            self.for_each_owned_child(id, &mut |c| children.push(c));
            for &c in children.iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Number of nodes reachable from the root along owned edges.
    pub fn live_node_count(&self) -> usize {
        self.collect_live().len()
    }
}

fn visit_animator_animations(animators: &[Animator], f: &mut impl FnMut(NodeId)) {
    for a in animators {
        f(a.animation);
        if let Some(controller) = &a.controller {
            visit_animator_animations(&controller.animators, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_hands_out_sequential_ids() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let a = g.alloc(NodeKind::ContainerShape(ContainerShape::default()));
        let b = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        assert_eq!(a, NodeId(1));
        assert_eq!(b, NodeId(2));
    }

    #[test]
    fn live_count_excludes_detached_nodes() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let child = g.alloc(NodeKind::ContainerVisual(Visual::default()));
        let _orphan = g.alloc(NodeKind::ContainerVisual(Visual::default()));
        g.child_visuals_mut(g.root()).push(child);
        assert_eq!(g.live_node_count(), 2);
    }

    #[test]
    fn animations_count_as_owned_edges() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let anim = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(
            KeyFrames::new(),
        )));
        g.start_animation(g.root(), "Opacity", anim);
        assert_eq!(g.live_node_count(), 2);
    }

    #[test]
    fn stop_animation_removes_first_matching_binding() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let a1 = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(
            KeyFrames::new(),
        )));
        let a2 = g.alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(
            KeyFrames::new(),
        )));
        g.start_animation(g.root(), "Opacity", a1);
        g.start_animation(g.root(), "Opacity", a2);

        let removed = g.stop_animation(g.root(), "Opacity").unwrap();
        assert_eq!(removed.animation, a1);
        assert!(g.is_animated(g.root(), "Opacity"));
    }

    #[test]
    #[should_panic(expected = "owns no shape list")]
    fn child_shapes_on_sprite_shape_fails_fast() {
        let mut g = Graph::with_root(NodeKind::ContainerVisual(Visual::default()));
        let sprite = g.alloc(NodeKind::SpriteShape(SpriteShape::default()));
        let _ = g.child_shapes(sprite);
    }
}
