//! Lowers a parsed BodyMovin document into the composition graph.
//!
//! Layers become container-visual chains over `ShapeVisual`s; shape groups
//! become container-shape trees; geometry/fill/stroke runs become sprite
//! shapes. Animated document lanes become keyframe animations bound through
//! animators whose controllers drive progress from the root `Progress`
//! property via an expression. Layer in/out points that do not span the
//! whole composition become visibility-encoded `Scale` animators, which the
//! optimizer later rewrites into `IsVisible` on the visual tree.

use std::collections::HashSet;

use crate::document::model::{
    Animatable, Asset, DocEasing, DocKeyFrame, FillItem, Layer, LayerBase, LayerTransform,
    LottieComposition, PreCompLayer, ShapeItem, ShapeLayer, SolidLayer, StrokeItem, TrimPathItem,
};
use crate::foundation::core::{Color, Vec2, Vector3};
use crate::foundation::error::{LumoraError, LumoraResult};
use crate::graph::{
    AnimationController, Animator, CapStyle, ColorBrush, ContainerShape, Easing,
    EllipseGeometry, ExpressionAnimation, Graph, InsetClip, KeyFrameAnimation, KeyFrames,
    LineJoin, NodeId, NodeKind, PathGeometry, RectangleGeometry, RoundedRectangleGeometry,
    ShapeVisual, SpriteShape, StrokeStyle, Visual,
};
use crate::issues::Issues;

const MAX_PRECOMP_DEPTH: usize = 16;

/// Translate a parsed document into a fresh composition graph.
pub fn translate(doc: &LottieComposition, issues: &mut Issues) -> LumoraResult<Graph> {
    let mut graph = Graph::with_root(NodeKind::ContainerVisual(Visual {
        size: Some(Vec2::new(doc.width, doc.height)),
        ..Visual::default()
    }));
    let root = graph.root();
    graph.node_mut(root).name = doc.name.clone();
    graph.properties_mut(root).insert_scalar("Progress", 0.0);

    let mut tx = Translator {
        doc,
        issues,
        graph,
        root,
    };
    tx.translate_layers(&doc.layers, root, 0)?;
    Ok(tx.graph)
}

struct Translator<'a> {
    doc: &'a LottieComposition,
    issues: &'a mut Issues,
    graph: Graph,
    root: NodeId,
}

impl Translator<'_> {
    fn translate_layers(
        &mut self,
        layers: &[Layer],
        parent_visual: NodeId,
        depth: usize,
    ) -> LumoraResult<()> {
        if depth > MAX_PRECOMP_DEPTH {
            return Err(LumoraError::translation("precomp nesting too deep"));
        }

        // BodyMovin lists the topmost layer first; visual children paint in
        // order, so emit back-to-front.
        for layer in layers.iter().rev() {
            let Some(content) = self.translate_layer(layer, depth)? else {
                continue;
            };
            let wrapped = self.wrap_in_parent_chain(content, layer, layers);
            self.graph.child_visuals_mut(parent_visual).push(wrapped);
        }
        Ok(())
    }

    fn translate_layer(&mut self, layer: &Layer, depth: usize) -> LumoraResult<Option<NodeId>> {
        match layer {
            Layer::Null(_) => Ok(None),
            Layer::Shape(l) => Ok(Some(self.translate_shape_layer(l))),
            Layer::Solid(l) => Ok(Some(self.translate_solid_layer(l))),
            Layer::PreComp(l) => self.translate_precomp_layer(l, depth),
        }
    }

    /// Wrap a layer's content in one container per ancestor in its parent
    /// chain, each carrying only that ancestor's transform (parenting does
    /// not inherit opacity).
    fn wrap_in_parent_chain(
        &mut self,
        content: NodeId,
        layer: &Layer,
        siblings: &[Layer],
    ) -> NodeId {
        let mut wrapped = content;
        let mut seen = HashSet::new();
        let mut parent_index = layer.base().parent;

        while let Some(index) = parent_index {
            if !seen.insert(index) {
                self.issues
                    .unexpected_value("layers", format!("parent cycle through layer {index}"));
                break;
            }
            let Some(parent) = siblings.iter().find(|l| l.base().index == Some(index)) else {
                self.issues
                    .unexpected_value("layers", format!("missing parent layer {index}"));
                break;
            };

            let wrapper = self.graph.alloc(NodeKind::ContainerVisual(Visual {
                children: vec![wrapped],
                ..Visual::default()
            }));
            self.graph.node_mut(wrapper).name = parent.base().name.clone();
            self.apply_layer_transform(wrapper, &parent.base().transform, false);
            wrapped = wrapper;
            parent_index = parent.base().parent;
        }
        wrapped
    }

    fn translate_shape_layer(&mut self, layer: &ShapeLayer) -> NodeId {
        let shapes = self.translate_shape_items(&layer.items, 1.0, None, None);
        let mut tree_root = self.graph.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes,
            ..ContainerShape::default()
        }));
        tree_root = self.wrap_shape_visibility(tree_root, &layer.base);

        let shape_visual = self.graph.alloc(NodeKind::ShapeVisual(ShapeVisual {
            visual: Visual {
                size: Some(Vec2::new(self.doc.width, self.doc.height)),
                ..Visual::default()
            },
            view_box: None,
            shapes: vec![tree_root],
        }));

        let container = self.graph.alloc(NodeKind::ContainerVisual(Visual {
            children: vec![shape_visual],
            ..Visual::default()
        }));
        self.graph.node_mut(container).name = layer.base.name.clone();
        self.apply_layer_transform(container, &layer.base.transform, true);
        container
    }

    fn translate_solid_layer(&mut self, layer: &SolidLayer) -> NodeId {
        let geometry = self.graph.alloc(NodeKind::RectangleGeometry(RectangleGeometry {
            trim: Default::default(),
            offset: None,
            size: Vec2::new(layer.width, layer.height),
        }));
        let brush = self.graph.alloc(NodeKind::ColorBrush(ColorBrush {
            color: Some(layer.color),
        }));
        let sprite = self.graph.alloc(NodeKind::SpriteShape(SpriteShape {
            geometry: Some(geometry),
            fill_brush: Some(brush),
            ..SpriteShape::default()
        }));
        let mut tree_root = self.graph.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![sprite],
            ..ContainerShape::default()
        }));
        tree_root = self.wrap_shape_visibility(tree_root, &layer.base);

        let shape_visual = self.graph.alloc(NodeKind::ShapeVisual(ShapeVisual {
            visual: Visual {
                size: Some(Vec2::new(self.doc.width, self.doc.height)),
                ..Visual::default()
            },
            view_box: None,
            shapes: vec![tree_root],
        }));
        let container = self.graph.alloc(NodeKind::ContainerVisual(Visual {
            children: vec![shape_visual],
            ..Visual::default()
        }));
        self.graph.node_mut(container).name = layer.base.name.clone();
        self.apply_layer_transform(container, &layer.base.transform, true);
        container
    }

    fn translate_precomp_layer(
        &mut self,
        layer: &PreCompLayer,
        depth: usize,
    ) -> LumoraResult<Option<NodeId>> {
        let Some(asset) = self.doc.asset(&layer.ref_id) else {
            self.issues.missing_asset(&layer.ref_id);
            return Ok(None);
        };
        let layers = match asset {
            Asset::PreComp { layers, .. } => layers.clone(),
            Asset::Image { id } => {
                self.issues
                    .report("LM0012", format!("image asset not supported: {id}"));
                return Ok(None);
            }
        };

        // Precomp content is clipped to the declared viewport.
        let clip = self.graph.alloc(NodeKind::InsetClip(InsetClip::default()));
        let content = self.graph.alloc(NodeKind::ContainerVisual(Visual {
            size: Some(Vec2::new(layer.width, layer.height)),
            clip: Some(clip),
            ..Visual::default()
        }));
        self.translate_layers(&layers, content, depth + 1)?;

        let container = self.graph.alloc(NodeKind::ContainerVisual(Visual {
            children: vec![content],
            ..Visual::default()
        }));
        self.graph.node_mut(container).name = layer.base.name.clone();
        self.apply_layer_transform(container, &layer.base.transform, true);
        self.bind_visual_visibility(container, &layer.base);
        Ok(Some(container))
    }

    /// Shape-layer in/out points become a visibility-encoded scale wrapper.
    fn wrap_shape_visibility(&mut self, inner: NodeId, base: &LayerBase) -> NodeId {
        let in_progress = self.to_progress(base.in_point);
        let out_progress = self.to_progress(base.out_point);
        if in_progress <= 0.0 && out_progress >= 1.0 {
            return inner;
        }

        let wrapper = self.graph.alloc(NodeKind::ContainerShape(ContainerShape {
            shapes: vec![inner],
            ..ContainerShape::default()
        }));

        let visible_at_start = in_progress <= 0.0;
        let initial = if visible_at_start {
            Vec2::new(1.0, 1.0)
        } else {
            Vec2::ZERO
        };
        self.graph.shape_transform_mut(wrapper).scale = Some(initial);

        let mut frames = KeyFrames::new();
        frames.insert_value(0.0, initial, Easing::Hold);
        if in_progress > 0.0 {
            frames.insert_value(in_progress, Vec2::new(1.0, 1.0), Easing::Step);
        }
        if out_progress < 1.0 {
            frames.insert_value(out_progress, Vec2::ZERO, Easing::Step);
        }
        let animation = self
            .graph
            .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(frames)));
        let controller = self.progress_controller();
        self.graph
            .start_controlled_animation(wrapper, "Scale", animation, controller);
        wrapper
    }

    /// Non-shape content gets its in/out points as boolean `IsVisible`
    /// keyframes directly on the visual.
    fn bind_visual_visibility(&mut self, visual: NodeId, base: &LayerBase) {
        let in_progress = self.to_progress(base.in_point);
        let out_progress = self.to_progress(base.out_point);
        if in_progress <= 0.0 && out_progress >= 1.0 {
            return;
        }

        let visible_at_start = in_progress <= 0.0;
        let mut frames = KeyFrames::new();
        frames.insert_value(0.0, visible_at_start, Easing::Hold);
        if in_progress > 0.0 {
            frames.insert_value(in_progress, true, Easing::Hold);
        }
        if out_progress < 1.0 {
            frames.insert_value(out_progress, false, Easing::Hold);
        }
        let animation = self
            .graph
            .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Boolean(frames)));
        let controller = self.progress_controller();
        self.graph
            .start_controlled_animation(visual, "IsVisible", animation, controller);
    }

    /// Fills and strokes apply to every geometry at their own level and in
    /// nested groups, so the nearest enclosing pair is threaded down.
    fn translate_shape_items<'i>(
        &mut self,
        items: &'i [ShapeItem],
        opacity: f64,
        inherited_fill: Option<&'i FillItem>,
        inherited_stroke: Option<&'i StrokeItem>,
    ) -> Vec<NodeId> {
        let fill = items
            .iter()
            .find_map(|i| match i {
                ShapeItem::Fill(f) => Some(f),
                _ => None,
            })
            .or(inherited_fill);
        let stroke = items
            .iter()
            .find_map(|i| match i {
                ShapeItem::Stroke(s) => Some(s),
                _ => None,
            })
            .or(inherited_stroke);
        let trim = items.iter().find_map(|i| match i {
            ShapeItem::TrimPath(t) => Some(t),
            _ => None,
        });
        let group_transform = items.iter().find_map(|i| match i {
            ShapeItem::Transform(t) => Some(t.transform.clone()),
            _ => None,
        });
        if items
            .iter()
            .filter(|i| matches!(i, ShapeItem::Fill(_)))
            .count()
            > 1
        {
            self.issues
                .report("LM0013", "multiple fills in one group; using the first");
        }

        let mut group_opacity = opacity;
        if let Some(t) = &group_transform {
            match &t.opacity_percent {
                Animatable::Static(o) => group_opacity *= o / 100.0,
                Animatable::Animated(_) => {
                    self.issues
                        .unexpected_value("shape group", "animated group opacity");
                }
            }
        }

        // Draw order within a group is last-item-first.
        let mut shapes = Vec::new();
        for item in items.iter().rev() {
            match item {
                ShapeItem::Group(g) => {
                    let children =
                        self.translate_shape_items(&g.items, group_opacity, fill, stroke);
                    let container = self.graph.alloc(NodeKind::ContainerShape(ContainerShape {
                        shapes: children,
                        ..ContainerShape::default()
                    }));
                    self.graph.node_mut(container).name = g.name.clone();
                    shapes.push(container);
                }
                ShapeItem::Rectangle(_) | ShapeItem::Ellipse(_) | ShapeItem::Path(_) => {
                    let sprite = self.translate_geometry_sprite(
                        item,
                        fill,
                        stroke,
                        trim,
                        group_opacity,
                    );
                    shapes.push(sprite);
                }
                ShapeItem::Fill(_)
                | ShapeItem::Stroke(_)
                | ShapeItem::Transform(_)
                | ShapeItem::TrimPath(_) => {}
            }
        }

        if let Some(t) = group_transform {
            let container = self.graph.alloc(NodeKind::ContainerShape(ContainerShape {
                shapes,
                ..ContainerShape::default()
            }));
            self.apply_group_transform(container, &t);
            vec![container]
        } else {
            shapes
        }
    }

    fn translate_geometry_sprite(
        &mut self,
        item: &ShapeItem,
        fill: Option<&FillItem>,
        stroke: Option<&StrokeItem>,
        trim: Option<&TrimPathItem>,
        opacity: f64,
    ) -> NodeId {
        let geometry = match item {
            ShapeItem::Rectangle(r) => {
                let position = self.static_vec2(&r.position, "rectangle position");
                let size = self.static_vec2(&r.size, "rectangle size");
                let radius = self.static_scalar(&r.corner_radius, "rectangle roundness");
                let offset = position - size / 2.0;
                if radius > 0.0 {
                    self.graph
                        .alloc(NodeKind::RoundedRectangleGeometry(RoundedRectangleGeometry {
                            trim: Default::default(),
                            offset: Some(offset),
                            size,
                            corner_radius: Vec2::new(radius, radius),
                        }))
                } else {
                    self.graph.alloc(NodeKind::RectangleGeometry(RectangleGeometry {
                        trim: Default::default(),
                        offset: Some(offset),
                        size,
                    }))
                }
            }
            ShapeItem::Ellipse(e) => {
                let center = self.static_vec2(&e.position, "ellipse position");
                let size = self.static_vec2(&e.size, "ellipse size");
                self.graph.alloc(NodeKind::EllipseGeometry(EllipseGeometry {
                    trim: Default::default(),
                    center,
                    radius: size / 2.0,
                }))
            }
            ShapeItem::Path(p) => {
                let geometry = match &p.path {
                    Animatable::Static(path) => {
                        self.graph.alloc(NodeKind::PathGeometry(PathGeometry {
                            trim: Default::default(),
                            path: path.clone(),
                        }))
                    }
                    Animatable::Animated(frames) => {
                        let initial = frames
                            .first()
                            .map(|f| f.value.clone())
                            .unwrap_or_default();
                        let geometry = self.graph.alloc(NodeKind::PathGeometry(PathGeometry {
                            trim: Default::default(),
                            path: initial,
                        }));
                        let k = self.keyframes(frames, Clone::clone);
                        let animation = self
                            .graph
                            .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Path(k)));
                        let controller = self.progress_controller();
                        self.graph
                            .start_controlled_animation(geometry, "Path", animation, controller);
                        geometry
                    }
                };
                geometry
            }
            other => panic!(
                "translate_geometry_sprite: {:?} is not a geometry item",
                std::mem::discriminant(other)
            ),
        };

        if let Some(trim) = trim {
            self.apply_trim(geometry, trim);
        }

        let fill_brush = fill.map(|f| self.color_brush(&f.color, &f.opacity_percent, opacity));
        let (stroke_brush, stroke_style) = match stroke {
            Some(s) => {
                let brush = self.color_brush(&s.color, &s.opacity_percent, opacity);
                (Some(brush), self.stroke_style(s))
            }
            None => (None, StrokeStyle::default()),
        };

        self.graph.alloc(NodeKind::SpriteShape(SpriteShape {
            geometry: Some(geometry),
            fill_brush,
            stroke_brush,
            stroke: stroke_style,
            ..SpriteShape::default()
        }))
    }

    fn apply_trim(&mut self, geometry: NodeId, trim: &TrimPathItem) {
        let properties: [(&str, &Animatable<f64>, f64, f64); 3] = [
            ("TrimStart", &trim.start, 1.0 / 100.0, 0.0),
            ("TrimEnd", &trim.end, 1.0 / 100.0, 1.0),
            ("TrimOffset", &trim.offset, 1.0 / 360.0, 0.0),
        ];
        for (name, lane, factor, default) in properties {
            match lane {
                Animatable::Static(v) => {
                    let value = v * factor;
                    if (value - default).abs() > f64::EPSILON {
                        self.set_trim_slot(geometry, name, value);
                    }
                }
                Animatable::Animated(frames) => {
                    let initial = frames.first().map_or(default, |f| f.value * factor);
                    self.set_trim_slot(geometry, name, initial);
                    let k = self.keyframes(frames, |v| v * factor);
                    let animation = self
                        .graph
                        .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(k)));
                    let controller = self.progress_controller();
                    self.graph
                        .start_controlled_animation(geometry, name, animation, controller);
                }
            }
        }
    }

    fn set_trim_slot(&mut self, geometry: NodeId, name: &str, value: f64) {
        let trim = match self.graph.kind_mut(geometry) {
            NodeKind::PathGeometry(g) => &mut g.trim,
            NodeKind::EllipseGeometry(g) => &mut g.trim,
            NodeKind::RectangleGeometry(g) => &mut g.trim,
            NodeKind::RoundedRectangleGeometry(g) => &mut g.trim,
            other => panic!("set_trim_slot: {} is not a geometry", other.name()),
        };
        match name {
            "TrimStart" => trim.trim_start = Some(value),
            "TrimEnd" => trim.trim_end = Some(value),
            "TrimOffset" => trim.trim_offset = Some(value),
            _ => unreachable!("unknown trim slot {name}"),
        }
    }

    fn color_brush(
        &mut self,
        color: &Animatable<Color>,
        opacity_percent: &Animatable<f64>,
        extra_opacity: f64,
    ) -> NodeId {
        let opacity = match opacity_percent {
            Animatable::Static(o) => o / 100.0 * extra_opacity,
            Animatable::Animated(_) => {
                self.issues
                    .unexpected_value("brush", "animated fill/stroke opacity");
                extra_opacity
            }
        };

        match color {
            Animatable::Static(c) => {
                let c = Color::new(c.a * opacity, c.r, c.g, c.b);
                self.graph
                    .alloc(NodeKind::ColorBrush(ColorBrush { color: Some(c) }))
            }
            Animatable::Animated(frames) => {
                let initial = frames.first().map(|f| f.value).unwrap_or(Color::BLACK);
                let brush = self.graph.alloc(NodeKind::ColorBrush(ColorBrush {
                    color: Some(Color::new(initial.a * opacity, initial.r, initial.g, initial.b)),
                }));
                let k = self.keyframes(frames, |c| Color::new(c.a * opacity, c.r, c.g, c.b));
                let animation = self
                    .graph
                    .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Color(k)));
                let controller = self.progress_controller();
                self.graph
                    .start_controlled_animation(brush, "Color", animation, controller);
                brush
            }
        }
    }

    fn stroke_style(&mut self, stroke: &StrokeItem) -> StrokeStyle {
        let thickness = match &stroke.width {
            Animatable::Static(w) => *w,
            Animatable::Animated(frames) => {
                self.issues
                    .unexpected_value("stroke", "animated stroke width");
                frames.first().map_or(1.0, |f| f.value)
            }
        };
        let cap = match stroke.line_cap {
            2 => CapStyle::Round,
            3 => CapStyle::Square,
            _ => CapStyle::Flat,
        };
        StrokeStyle {
            thickness: Some(thickness),
            miter_limit: stroke.miter_limit,
            start_cap: Some(cap),
            end_cap: Some(cap),
            dash_cap: Some(cap),
            line_join: Some(match stroke.line_join {
                2 => LineJoin::Round,
                3 => LineJoin::Bevel,
                _ => LineJoin::Miter,
            }),
            dash_offset: None,
            dash_array: Vec::new(),
        }
    }

    /// Apply a document transform to a container visual. Parent-chain
    /// wrappers pass `include_opacity = false`.
    fn apply_layer_transform(
        &mut self,
        visual: NodeId,
        t: &LayerTransform,
        include_opacity: bool,
    ) {
        let anchor = self.static_vec2(&t.anchor, "anchor point");
        if anchor != Vec2::ZERO {
            self.graph.visual_mut(visual).transform.center_point =
                Some(Vector3::from_xy(anchor));
        }

        match &t.position {
            Animatable::Static(p) => {
                let offset = *p - anchor;
                if offset != Vec2::ZERO {
                    self.graph.visual_mut(visual).transform.offset =
                        Some(Vector3::from_xy(offset));
                }
            }
            Animatable::Animated(frames) => {
                let initial = frames.first().map_or(Vec2::ZERO, |f| f.value) - anchor;
                self.graph.visual_mut(visual).transform.offset = Some(Vector3::from_xy(initial));
                let k = self.keyframes(frames, |p| Vector3::from_xy(*p - anchor));
                let animation = self
                    .graph
                    .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector3(k)));
                let controller = self.progress_controller();
                self.graph
                    .start_controlled_animation(visual, "Offset", animation, controller);
            }
        }

        match &t.scale {
            Animatable::Static(s) => {
                let s = *s / 100.0;
                if s != Vec2::new(1.0, 1.0) {
                    self.graph.visual_mut(visual).transform.scale =
                        Some(Vector3::new(s.x, s.y, 1.0));
                }
            }
            Animatable::Animated(frames) => {
                let initial = frames.first().map_or(Vec2::new(1.0, 1.0), |f| f.value) / 100.0;
                self.graph.visual_mut(visual).transform.scale =
                    Some(Vector3::new(initial.x, initial.y, 1.0));
                let k = self.keyframes(frames, |s| Vector3::new(s.x / 100.0, s.y / 100.0, 1.0));
                let animation = self
                    .graph
                    .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector3(k)));
                let controller = self.progress_controller();
                self.graph
                    .start_controlled_animation(visual, "Scale", animation, controller);
            }
        }

        match &t.rotation_degrees {
            Animatable::Static(r) => {
                if *r != 0.0 {
                    self.graph.visual_mut(visual).transform.rotation_degrees = Some(*r);
                }
            }
            Animatable::Animated(frames) => {
                let initial = frames.first().map_or(0.0, |f| f.value);
                self.graph.visual_mut(visual).transform.rotation_degrees = Some(initial);
                let k = self.keyframes(frames, |r| *r);
                let animation = self
                    .graph
                    .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(k)));
                let controller = self.progress_controller();
                self.graph.start_controlled_animation(
                    visual,
                    "RotationAngleInDegrees",
                    animation,
                    controller,
                );
            }
        }

        if include_opacity {
            match &t.opacity_percent {
                Animatable::Static(o) => {
                    let o = o / 100.0;
                    if o < 1.0 {
                        self.graph.visual_mut(visual).opacity = Some(o);
                    }
                }
                Animatable::Animated(frames) => {
                    let initial = frames.first().map_or(1.0, |f| f.value) / 100.0;
                    self.graph.visual_mut(visual).opacity = Some(initial);
                    let k = self.keyframes(frames, |o| o / 100.0);
                    let animation = self
                        .graph
                        .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(k)));
                    let controller = self.progress_controller();
                    self.graph
                        .start_controlled_animation(visual, "Opacity", animation, controller);
                }
            }
        }
    }

    /// Apply a group transform (`tr` item) to a container shape. Group
    /// opacity has already been folded into brush colors.
    fn apply_group_transform(&mut self, shape: NodeId, t: &LayerTransform) {
        let anchor = self.static_vec2(&t.anchor, "group anchor");
        if anchor != Vec2::ZERO {
            self.graph.shape_transform_mut(shape).center_point = Some(anchor);
        }

        match &t.position {
            Animatable::Static(p) => {
                let offset = *p - anchor;
                if offset != Vec2::ZERO {
                    self.graph.shape_transform_mut(shape).offset = Some(offset);
                }
            }
            Animatable::Animated(frames) => {
                let initial = frames.first().map_or(Vec2::ZERO, |f| f.value) - anchor;
                self.graph.shape_transform_mut(shape).offset = Some(initial);
                let k = self.keyframes(frames, |p| *p - anchor);
                let animation = self
                    .graph
                    .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)));
                let controller = self.progress_controller();
                self.graph
                    .start_controlled_animation(shape, "Offset", animation, controller);
            }
        }

        match &t.scale {
            Animatable::Static(s) => {
                let s = *s / 100.0;
                if s != Vec2::new(1.0, 1.0) {
                    self.graph.shape_transform_mut(shape).scale = Some(s);
                }
            }
            Animatable::Animated(frames) => {
                let initial = frames.first().map_or(Vec2::new(1.0, 1.0), |f| f.value) / 100.0;
                self.graph.shape_transform_mut(shape).scale = Some(initial);
                let k = self.keyframes(frames, |s| *s / 100.0);
                let animation = self
                    .graph
                    .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)));
                let controller = self.progress_controller();
                self.graph
                    .start_controlled_animation(shape, "Scale", animation, controller);
            }
        }

        match &t.rotation_degrees {
            Animatable::Static(r) => {
                if *r != 0.0 {
                    self.graph.shape_transform_mut(shape).rotation_degrees = Some(*r);
                }
            }
            Animatable::Animated(frames) => {
                let initial = frames.first().map_or(0.0, |f| f.value);
                self.graph.shape_transform_mut(shape).rotation_degrees = Some(initial);
                let k = self.keyframes(frames, |r| *r);
                let animation = self
                    .graph
                    .alloc(NodeKind::KeyFrameAnimation(KeyFrameAnimation::Scalar(k)));
                let controller = self.progress_controller();
                self.graph.start_controlled_animation(
                    shape,
                    "RotationAngleInDegrees",
                    animation,
                    controller,
                );
            }
        }
    }

    /// A paused controller whose `Progress` tracks the root's `Progress`
    /// property through an expression reference.
    fn progress_controller(&mut self) -> AnimationController {
        let mut expr = ExpressionAnimation::new("_.Progress");
        expr.set_reference_parameter("_", self.root);
        let animation = self.graph.alloc(NodeKind::ExpressionAnimation(expr));
        AnimationController {
            paused: true,
            animators: vec![Animator {
                target_property: "Progress".to_owned(),
                animation,
                controller: None,
            }],
        }
    }

    fn keyframes<T, U>(
        &self,
        frames: &[DocKeyFrame<T>],
        mut map: impl FnMut(&T) -> U,
    ) -> KeyFrames<U> {
        let mut out = KeyFrames::new();
        for (i, f) in frames.iter().enumerate() {
            // The document stores a segment's easing on the keyframe that
            // starts it; the graph stores it on the keyframe that ends it.
            let easing = if i == 0 {
                Easing::Hold
            } else {
                convert_easing(&frames[i - 1].easing)
            };
            out.insert_value(self.to_progress(f.frame), map(&f.value), easing);
        }
        out
    }

    fn to_progress(&self, frame: f64) -> f64 {
        let duration = self.doc.duration_frames();
        if duration <= 0.0 {
            return 0.0;
        }
        ((frame - self.doc.in_point) / duration).clamp(0.0, 1.0)
    }

    fn static_vec2(&mut self, lane: &Animatable<Vec2>, context: &'static str) -> Vec2 {
        match lane {
            Animatable::Static(v) => *v,
            Animatable::Animated(frames) => {
                self.issues
                    .unexpected_value(context, "animated value folded to its initial frame");
                frames.first().map_or(Vec2::ZERO, |f| f.value)
            }
        }
    }

    fn static_scalar(&mut self, lane: &Animatable<f64>, context: &'static str) -> f64 {
        match lane {
            Animatable::Static(v) => *v,
            Animatable::Animated(frames) => {
                self.issues
                    .unexpected_value(context, "animated value folded to its initial frame");
                frames.first().map_or(0.0, |f| f.value)
            }
        }
    }
}

fn convert_easing(e: &DocEasing) -> Easing {
    match e {
        DocEasing::Linear => Easing::Linear,
        DocEasing::Hold => Easing::Hold,
        DocEasing::Bezier {
            out_tangent,
            in_tangent,
        } => Easing::CubicBezier {
            control_point_1: *out_tangent,
            control_point_2: *in_tangent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse::parse_composition;
    use crate::graph::index::GraphIndex;

    fn doc(json: &str) -> (LottieComposition, Issues) {
        let mut issues = Issues::new();
        let doc = parse_composition(json.as_bytes(), &mut issues).unwrap();
        (doc, issues)
    }

    const ONE_SHAPE: &str = r#"{
        "v": "5.5.7", "w": 100, "h": 100, "ip": 0, "op": 60, "fr": 30,
        "layers": [{
            "ty": 4, "ind": 1, "ip": 0, "op": 60, "st": 0,
            "ks": {"p": {"a": 0, "k": [50, 50]}, "o": {"a": 0, "k": 50}},
            "shapes": [{"ty": "gr", "it": [
                {"ty": "el", "p": {"a": 0, "k": [0, 0]}, "s": {"a": 0, "k": [20, 20]}},
                {"ty": "fl", "c": {"a": 0, "k": [1, 0, 0, 1]}, "o": {"a": 0, "k": 100}},
                {"ty": "tr", "p": {"a": 0, "k": [0, 0]}, "o": {"a": 0, "k": 100}}
            ]}]
        }]
    }"#;

    #[test]
    fn shape_layer_lowered_to_visual_over_shape_tree() {
        let (doc, mut issues) = doc(ONE_SHAPE);
        let g = translate(&doc, &mut issues).unwrap();

        let root = g.root();
        assert_eq!(g.visual(root).size, Some(Vec2::new(100.0, 100.0)));
        assert_eq!(g.child_visuals(root).len(), 1);

        let layer = g.child_visuals(root)[0];
        assert!(matches!(g.kind(layer), NodeKind::ContainerVisual(_)));
        assert_eq!(
            g.visual(layer).transform.offset,
            Some(Vector3::new(50.0, 50.0, 0.0))
        );
        assert_eq!(g.visual(layer).opacity, Some(0.5));

        let shape_visual = g.child_visuals(layer)[0];
        assert!(matches!(g.kind(shape_visual), NodeKind::ShapeVisual(_)));

        // Somewhere under the shape tree there is one sprite with a red fill.
        let sprites: Vec<_> = g
            .collect_live()
            .into_iter()
            .filter(|&id| matches!(g.kind(id), NodeKind::SpriteShape(_)))
            .collect();
        assert_eq!(sprites.len(), 1);
        let NodeKind::SpriteShape(s) = g.kind(sprites[0]) else {
            unreachable!();
        };
        let NodeKind::ColorBrush(b) = g.kind(s.fill_brush.unwrap()) else {
            panic!("expected color brush");
        };
        assert!((b.color.unwrap().r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clipped_layer_gets_visibility_scale_wrapper() {
        let json = r#"{
            "v": "5.5.7", "w": 100, "h": 100, "ip": 0, "op": 60, "fr": 30,
            "layers": [{
                "ty": 4, "ind": 1, "ip": 15, "op": 45, "st": 0,
                "ks": {},
                "shapes": [{"ty": "el", "p": {"a": 0, "k": [0, 0]}, "s": {"a": 0, "k": [10, 10]}}]
            }]
        }"#;
        let (doc, mut issues) = doc(json);
        let g = translate(&doc, &mut issues).unwrap();

        let wrapper = g
            .collect_live()
            .into_iter()
            .find(|&id| g.is_animated(id, "Scale"))
            .expect("visibility wrapper");
        assert!(matches!(g.kind(wrapper), NodeKind::ContainerShape(_)));
        assert_eq!(g.shape_transform(wrapper).scale, Some(Vec2::ZERO));

        let animator = &g.animators(wrapper)[0];
        let NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector2(k)) =
            g.kind(animator.animation)
        else {
            panic!("expected vector2 keyframes");
        };
        assert_eq!(k.frames.len(), 3);
        assert!(k.frames.iter().all(|f| f.easing.is_discrete()));

        // The controller's progress expression references the root.
        let controller = animator.controller.as_ref().expect("controller");
        let NodeKind::ExpressionAnimation(e) = g.kind(controller.animators[0].animation) else {
            panic!("expected progress expression");
        };
        assert_eq!(e.reference("_"), Some(g.root()));
        let index = GraphIndex::build(&g);
        assert!(index.has_in_references(g.root()));
    }

    #[test]
    fn animated_position_binds_offset_keyframes() {
        let json = r#"{
            "v": "5.5.7", "w": 100, "h": 100, "ip": 0, "op": 60, "fr": 30,
            "layers": [{
                "ty": 4, "ind": 1, "ip": 0, "op": 60, "st": 0,
                "ks": {"p": {"a": 1, "k": [
                    {"t": 0, "s": [0, 0], "e": [40, 0]},
                    {"t": 60, "s": [40, 0]}
                ]}},
                "shapes": [{"ty": "el", "p": {"a": 0, "k": [0, 0]}, "s": {"a": 0, "k": [10, 10]}}]
            }]
        }"#;
        let (doc, mut issues) = doc(json);
        let g = translate(&doc, &mut issues).unwrap();

        let animated = g
            .collect_live()
            .into_iter()
            .find(|&id| g.is_animated(id, "Offset"))
            .expect("animated layer container");
        let animator = g
            .animators(animated)
            .iter()
            .find(|a| a.target_property == "Offset")
            .unwrap();
        let NodeKind::KeyFrameAnimation(KeyFrameAnimation::Vector3(k)) = g.kind(animator.animation)
        else {
            panic!("expected vector3 keyframes");
        };
        assert_eq!(k.frames.len(), 2);
        assert!((k.frames[1].progress - 1.0).abs() < 1e-9);
    }

    #[test]
    fn null_parent_contributes_transform_only() {
        let json = r#"{
            "v": "5.5.7", "w": 100, "h": 100, "ip": 0, "op": 60, "fr": 30,
            "layers": [
                {"ty": 3, "ind": 1, "ip": 0, "op": 60, "st": 0,
                 "ks": {"p": {"a": 0, "k": [30, 0]}, "o": {"a": 0, "k": 20}}},
                {"ty": 4, "ind": 2, "parent": 1, "ip": 0, "op": 60, "st": 0,
                 "ks": {},
                 "shapes": [{"ty": "el", "p": {"a": 0, "k": [0, 0]}, "s": {"a": 0, "k": [10, 10]}}]}
            ]
        }"#;
        let (doc, mut issues) = doc(json);
        let g = translate(&doc, &mut issues).unwrap();

        // Only the shape layer emits content; the null shows up as a wrapper
        // with its transform but no opacity.
        assert_eq!(g.child_visuals(g.root()).len(), 1);
        let wrapper = g.child_visuals(g.root())[0];
        assert_eq!(
            g.visual(wrapper).transform.offset,
            Some(Vector3::new(30.0, 0.0, 0.0))
        );
        assert_eq!(g.visual(wrapper).opacity, None);
    }

    #[test]
    fn precomp_layers_nest_with_viewport_clip() {
        let json = r##"{
            "v": "5.5.7", "w": 100, "h": 100, "ip": 0, "op": 60, "fr": 30,
            "assets": [{"id": "comp_0", "layers": [
                {"ty": 1, "ind": 1, "ip": 0, "op": 60, "st": 0, "ks": {},
                 "sw": 10, "sh": 10, "sc": "#ff0000"}
            ]}],
            "layers": [{
                "ty": 0, "ind": 1, "refId": "comp_0", "w": 50, "h": 50,
                "ip": 0, "op": 60, "st": 0, "ks": {}
            }]
        }"##;
        let (doc, mut issues) = doc(json);
        let g = translate(&doc, &mut issues).unwrap();
        assert!(issues.is_empty());

        let clipped = g
            .collect_live()
            .into_iter()
            .find(|&id| graph_has_clip(&g, id))
            .expect("precomp viewport container");
        assert_eq!(g.visual(clipped).size, Some(Vec2::new(50.0, 50.0)));
    }

    fn graph_has_clip(g: &Graph, id: NodeId) -> bool {
        matches!(g.kind(id), NodeKind::ContainerVisual(v) if v.clip.is_some())
    }
}
