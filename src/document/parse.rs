//! BodyMovin JSON parsing.
//!
//! The raw serde representation tolerates the dialect's many shorthands
//! (bare numbers vs. keyframe lists, scalar-or-array tangents, split
//! positions); interpretation into [`model`] types happens here, reporting
//! anything unsupported to the [`Issues`] collector. Only a missing required
//! header field or an empty layer list is fatal.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::document::model::{
    Animatable, Asset, DocEasing, DocKeyFrame, EllipseItem, FillItem, GroupTransform, Layer,
    LayerBase, LayerTransform, LottieComposition, Marker, NullLayer, PathItem, PreCompLayer,
    RectangleItem, ShapeGroup, ShapeItem, ShapeLayer, SolidLayer, StrokeItem, TrimPathItem,
};
use crate::foundation::core::{BezPath, Color, Point, Vec2};
use crate::foundation::error::{LumoraError, LumoraResult};
use crate::issues::Issues;

/// Parse a BodyMovin document from raw bytes.
pub fn parse_composition(bytes: &[u8], issues: &mut Issues) -> LumoraResult<LottieComposition> {
    let raw: RawDocument = serde_json::from_slice(bytes)
        .map_err(|e| LumoraError::parse(format!("malformed BodyMovin JSON: {e}")))?;

    let version = raw
        .v
        .ok_or_else(|| LumoraError::parse("missing required field: v"))?;
    let width = raw
        .w
        .ok_or_else(|| LumoraError::parse("missing required field: w"))?;
    let height = raw
        .h
        .ok_or_else(|| LumoraError::parse("missing required field: h"))?;
    let in_point = raw
        .ip
        .ok_or_else(|| LumoraError::parse("missing required field: ip"))?;
    if raw.layers.is_empty() {
        return Err(LumoraError::parse("document has no layers"));
    }

    let out_point = raw.op.unwrap_or(in_point);

    let assets = raw
        .assets
        .iter()
        .filter_map(|a| interpret_asset(a, issues))
        .collect();

    let layers = raw
        .layers
        .iter()
        .filter_map(|l| interpret_layer(l, issues))
        .collect();

    Ok(LottieComposition {
        version,
        name: raw.nm,
        width,
        height,
        in_point,
        out_point,
        frame_rate: raw.fr,
        is_3d: raw.ddd != 0,
        markers: raw
            .markers
            .into_iter()
            .map(|m| Marker {
                name: m.cm,
                frame: m.tm,
                duration_frames: m.dr,
            })
            .collect(),
        assets,
        layers,
    })
}

fn default_frame_rate() -> f64 {
    30.0
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    v: Option<String>,
    nm: Option<String>,
    w: Option<f64>,
    h: Option<f64>,
    ip: Option<f64>,
    op: Option<f64>,
    #[serde(default = "default_frame_rate")]
    fr: f64,
    #[serde(default)]
    ddd: u8,
    #[serde(default)]
    markers: Vec<RawMarker>,
    #[serde(default)]
    assets: Vec<JsonValue>,
    #[serde(default)]
    layers: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct RawMarker {
    #[serde(default)]
    cm: String,
    #[serde(default)]
    tm: f64,
    #[serde(default)]
    dr: f64,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    id: Option<String>,
    #[serde(default)]
    layers: Vec<JsonValue>,
    p: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLayer {
    ty: Option<i64>,
    ind: Option<u32>,
    parent: Option<u32>,
    nm: Option<String>,
    #[serde(default)]
    ip: f64,
    op: Option<f64>,
    #[serde(default)]
    st: f64,
    ks: Option<RawTransform>,
    #[serde(default)]
    shapes: Vec<JsonValue>,
    #[serde(rename = "refId")]
    ref_id: Option<String>,
    sw: Option<f64>,
    sh: Option<f64>,
    sc: Option<String>,
    w: Option<f64>,
    h: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTransform {
    a: Option<RawValue>,
    p: Option<JsonValue>,
    s: Option<RawValue>,
    r: Option<RawValue>,
    o: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    k: JsonValue,
}

#[derive(Debug, Deserialize)]
struct RawKeyFrame {
    t: f64,
    s: Option<JsonValue>,
    e: Option<JsonValue>,
    o: Option<RawTangent>,
    i: Option<RawTangent>,
    #[serde(default)]
    h: u8,
}

#[derive(Debug, Deserialize)]
struct RawTangent {
    x: JsonValue,
    y: JsonValue,
}

#[derive(Debug, Deserialize)]
struct RawBezier {
    #[serde(default)]
    c: bool,
    #[serde(default)]
    v: Vec<[f64; 2]>,
    #[serde(default)]
    i: Vec<[f64; 2]>,
    #[serde(default)]
    o: Vec<[f64; 2]>,
}

fn interpret_asset(value: &JsonValue, issues: &mut Issues) -> Option<Asset> {
    let raw: RawAsset = match serde_json::from_value(value.clone()) {
        Ok(a) => a,
        Err(e) => {
            issues.unexpected_value("assets", e);
            return None;
        }
    };
    let id = raw.id?;
    if !raw.layers.is_empty() {
        let layers = raw
            .layers
            .iter()
            .filter_map(|l| interpret_layer(l, issues))
            .collect();
        return Some(Asset::PreComp { id, layers });
    }
    if raw.p.is_some() {
        return Some(Asset::Image { id });
    }
    issues.unexpected_value("assets", format!("asset {id} has no content"));
    None
}

fn interpret_layer(value: &JsonValue, issues: &mut Issues) -> Option<Layer> {
    let raw: RawLayer = match serde_json::from_value(value.clone()) {
        Ok(l) => l,
        Err(e) => {
            issues.unexpected_value("layers", e);
            return None;
        }
    };

    let transform = raw
        .ks
        .as_ref()
        .map(|t| interpret_transform(t, issues))
        .unwrap_or_default();

    let base = LayerBase {
        index: raw.ind,
        parent: raw.parent,
        name: raw.nm.clone(),
        in_point: raw.ip,
        out_point: raw.op.unwrap_or(f64::INFINITY),
        start_time: raw.st,
        transform,
    };

    match raw.ty {
        Some(0) => {
            let Some(ref_id) = raw.ref_id else {
                issues.unexpected_value("precomp layer", "missing refId");
                return None;
            };
            Some(Layer::PreComp(PreCompLayer {
                base,
                ref_id,
                width: raw.w.unwrap_or(0.0),
                height: raw.h.unwrap_or(0.0),
            }))
        }
        Some(1) => Some(Layer::Solid(SolidLayer {
            base,
            color: raw
                .sc
                .as_deref()
                .and_then(parse_hex_color)
                .unwrap_or(Color::BLACK),
            width: raw.sw.unwrap_or(0.0),
            height: raw.sh.unwrap_or(0.0),
        })),
        Some(3) => Some(Layer::Null(NullLayer { base })),
        Some(4) => Some(Layer::Shape(ShapeLayer {
            base,
            items: raw
                .shapes
                .iter()
                .filter_map(|s| interpret_shape_item(s, issues))
                .collect(),
        })),
        other => {
            issues.unsupported_layer_type(
                other.map_or_else(|| "<missing>".to_owned(), |t| t.to_string()),
            );
            None
        }
    }
}

fn interpret_shape_item(value: &JsonValue, issues: &mut Issues) -> Option<ShapeItem> {
    let ty = value.get("ty").and_then(JsonValue::as_str).unwrap_or("");
    match ty {
        "gr" => {
            let items = value
                .get("it")
                .and_then(JsonValue::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| interpret_shape_item(i, issues))
                        .collect()
                })
                .unwrap_or_default();
            Some(ShapeItem::Group(ShapeGroup {
                name: value
                    .get("nm")
                    .and_then(JsonValue::as_str)
                    .map(str::to_owned),
                items,
            }))
        }
        "rc" => Some(ShapeItem::Rectangle(RectangleItem {
            position: vec2_lane(value.get("p"), Vec2::ZERO, issues),
            size: vec2_lane(value.get("s"), Vec2::ZERO, issues),
            corner_radius: scalar_lane(value.get("r"), 0.0, issues),
        })),
        "el" => Some(ShapeItem::Ellipse(EllipseItem {
            position: vec2_lane(value.get("p"), Vec2::ZERO, issues),
            size: vec2_lane(value.get("s"), Vec2::ZERO, issues),
        })),
        "sh" => Some(ShapeItem::Path(PathItem {
            path: path_lane(value.get("ks"), issues),
        })),
        "fl" => Some(ShapeItem::Fill(FillItem {
            color: color_lane(value.get("c"), issues),
            opacity_percent: scalar_lane(value.get("o"), 100.0, issues),
        })),
        "st" => Some(ShapeItem::Stroke(StrokeItem {
            color: color_lane(value.get("c"), issues),
            opacity_percent: scalar_lane(value.get("o"), 100.0, issues),
            width: scalar_lane(value.get("w"), 1.0, issues),
            line_cap: value.get("lc").and_then(JsonValue::as_u64).unwrap_or(1) as u8,
            line_join: value.get("lj").and_then(JsonValue::as_u64).unwrap_or(1) as u8,
            miter_limit: value.get("ml").and_then(JsonValue::as_f64),
        })),
        "tr" => {
            let raw: RawTransform = serde_json::from_value(value.clone()).unwrap_or_default();
            Some(ShapeItem::Transform(GroupTransform {
                transform: interpret_transform(&raw, issues),
            }))
        }
        "tm" => Some(ShapeItem::TrimPath(TrimPathItem {
            start: scalar_lane(value.get("s"), 0.0, issues),
            end: scalar_lane(value.get("e"), 100.0, issues),
            offset: scalar_lane(value.get("o"), 0.0, issues),
        })),
        other => {
            issues.unsupported_shape_item(if other.is_empty() { "<missing>" } else { other });
            None
        }
    }
}

fn interpret_transform(raw: &RawTransform, issues: &mut Issues) -> LayerTransform {
    let position = match &raw.p {
        None => Animatable::Static(Vec2::ZERO),
        Some(p) => {
            if p.get("s").and_then(JsonValue::as_bool) == Some(true) {
                // Split x/y position; animated split lanes are not
                // representable as one track.
                let x = p
                    .get("x")
                    .and_then(|v| v.get("k"))
                    .and_then(json_scalar)
                    .unwrap_or(0.0);
                let y = p
                    .get("y")
                    .and_then(|v| v.get("k"))
                    .and_then(json_scalar)
                    .unwrap_or(0.0);
                if p.get("x").and_then(|v| v.get("a")).and_then(JsonValue::as_u64) == Some(1)
                    || p.get("y").and_then(|v| v.get("a")).and_then(JsonValue::as_u64) == Some(1)
                {
                    issues.unexpected_value("transform", "animated split position");
                }
                Animatable::Static(Vec2::new(x, y))
            } else {
                match serde_json::from_value::<RawValue>(p.clone()) {
                    Ok(v) => interpret_vec2_value(&v, Vec2::ZERO, issues),
                    Err(e) => {
                        issues.unexpected_value("transform.p", e);
                        Animatable::Static(Vec2::ZERO)
                    }
                }
            }
        }
    };

    LayerTransform {
        anchor: raw
            .a
            .as_ref()
            .map(|v| interpret_vec2_value(v, Vec2::ZERO, issues))
            .unwrap_or(Animatable::Static(Vec2::ZERO)),
        position,
        scale: raw
            .s
            .as_ref()
            .map(|v| interpret_vec2_value(v, Vec2::new(100.0, 100.0), issues))
            .unwrap_or(Animatable::Static(Vec2::new(100.0, 100.0))),
        rotation_degrees: raw
            .r
            .as_ref()
            .map(|v| interpret_scalar_value(v, 0.0, issues))
            .unwrap_or(Animatable::Static(0.0)),
        opacity_percent: raw
            .o
            .as_ref()
            .map(|v| interpret_scalar_value(v, 100.0, issues))
            .unwrap_or(Animatable::Static(100.0)),
    }
}

fn scalar_lane(value: Option<&JsonValue>, default: f64, issues: &mut Issues) -> Animatable<f64> {
    match value.map(|v| serde_json::from_value::<RawValue>(v.clone())) {
        Some(Ok(raw)) => interpret_scalar_value(&raw, default, issues),
        Some(Err(e)) => {
            issues.unexpected_value("scalar value", e);
            Animatable::Static(default)
        }
        None => Animatable::Static(default),
    }
}

fn vec2_lane(value: Option<&JsonValue>, default: Vec2, issues: &mut Issues) -> Animatable<Vec2> {
    match value.map(|v| serde_json::from_value::<RawValue>(v.clone())) {
        Some(Ok(raw)) => interpret_vec2_value(&raw, default, issues),
        Some(Err(e)) => {
            issues.unexpected_value("vector value", e);
            Animatable::Static(default)
        }
        None => Animatable::Static(default),
    }
}

fn color_lane(value: Option<&JsonValue>, issues: &mut Issues) -> Animatable<Color> {
    match value.map(|v| serde_json::from_value::<RawValue>(v.clone())) {
        Some(Ok(raw)) => interpret_value(&raw, Color::BLACK, json_color, issues),
        Some(Err(e)) => {
            issues.unexpected_value("color value", e);
            Animatable::Static(Color::BLACK)
        }
        None => Animatable::Static(Color::BLACK),
    }
}

fn path_lane(value: Option<&JsonValue>, issues: &mut Issues) -> Animatable<BezPath> {
    match value.map(|v| serde_json::from_value::<RawValue>(v.clone())) {
        Some(Ok(raw)) => interpret_value(&raw, BezPath::new(), json_path, issues),
        Some(Err(e)) => {
            issues.unexpected_value("path value", e);
            Animatable::Static(BezPath::new())
        }
        None => Animatable::Static(BezPath::new()),
    }
}

fn interpret_scalar_value(
    raw: &RawValue,
    default: f64,
    issues: &mut Issues,
) -> Animatable<f64> {
    interpret_value(raw, default, json_scalar, issues)
}

fn interpret_vec2_value(raw: &RawValue, default: Vec2, issues: &mut Issues) -> Animatable<Vec2> {
    interpret_value(raw, default, json_vec2, issues)
}

fn interpret_value<T: Clone>(
    raw: &RawValue,
    default: T,
    read: fn(&JsonValue) -> Option<T>,
    issues: &mut Issues,
) -> Animatable<T> {
    if is_keyframe_list(&raw.k) {
        let mut frames = Vec::new();
        let mut previous_end: Option<T> = None;
        for kf in raw.k.as_array().into_iter().flatten() {
            let kf: RawKeyFrame = match serde_json::from_value(kf.clone()) {
                Ok(k) => k,
                Err(e) => {
                    issues.unexpected_value("keyframes", e);
                    continue;
                }
            };
            let value = kf
                .s
                .as_ref()
                .and_then(read)
                .or_else(|| previous_end.clone());
            let Some(value) = value else {
                issues.unexpected_value("keyframes", "keyframe with no start value");
                continue;
            };
            previous_end = kf.e.as_ref().and_then(read).or(Some(value.clone()));
            frames.push(DocKeyFrame {
                frame: kf.t,
                value,
                easing: interpret_easing(&kf),
            });
        }
        if frames.is_empty() {
            return Animatable::Static(default);
        }
        Animatable::Animated(frames)
    } else {
        Animatable::Static(read(&raw.k).unwrap_or(default))
    }
}

fn is_keyframe_list(k: &JsonValue) -> bool {
    k.as_array()
        .and_then(|a| a.first())
        .is_some_and(|first| first.get("t").is_some())
}

fn interpret_easing(kf: &RawKeyFrame) -> DocEasing {
    if kf.h == 1 {
        return DocEasing::Hold;
    }
    match (&kf.o, &kf.i) {
        (Some(o), Some(i)) => DocEasing::Bezier {
            out_tangent: Vec2::new(tangent_component(&o.x), tangent_component(&o.y)),
            in_tangent: Vec2::new(tangent_component(&i.x), tangent_component(&i.y)),
        },
        _ => DocEasing::Linear,
    }
}

fn tangent_component(v: &JsonValue) -> f64 {
    json_scalar(v).unwrap_or(0.0)
}

fn json_scalar(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Array(a) => a.first().and_then(JsonValue::as_f64),
        _ => None,
    }
}

fn json_vec2(v: &JsonValue) -> Option<Vec2> {
    let a = v.as_array()?;
    let x = a.first().and_then(JsonValue::as_f64)?;
    let y = a.get(1).and_then(JsonValue::as_f64)?;
    Some(Vec2::new(x, y))
}

fn json_color(v: &JsonValue) -> Option<Color> {
    let a = v.as_array()?;
    let mut channels = [0.0f64; 4];
    channels[3] = 1.0;
    for (i, c) in a.iter().take(4).enumerate() {
        channels[i] = c.as_f64()?;
    }
    // Some exporters write 0..255 channels.
    if channels.iter().any(|&c| c > 1.0) {
        for c in &mut channels {
            *c /= 255.0;
        }
    }
    Some(Color::new(channels[3], channels[0], channels[1], channels[2]))
}

fn json_path(v: &JsonValue) -> Option<BezPath> {
    // Animated path values wrap the bezier in a one-element array.
    let obj = if v.is_array() {
        v.as_array()?.first()?
    } else {
        v
    };
    let raw: RawBezier = serde_json::from_value(obj.clone()).ok()?;
    if raw.v.is_empty() {
        return Some(BezPath::new());
    }

    let vertex = |i: usize| Point::new(raw.v[i][0], raw.v[i][1]);
    let out_t = |i: usize| {
        raw.o
            .get(i)
            .map_or(Vec2::ZERO, |t| Vec2::new(t[0], t[1]))
    };
    let in_t = |i: usize| {
        raw.i
            .get(i)
            .map_or(Vec2::ZERO, |t| Vec2::new(t[0], t[1]))
    };

    let mut path = BezPath::new();
    path.move_to(vertex(0));
    for i in 1..raw.v.len() {
        path.curve_to(
            vertex(i - 1) + out_t(i - 1),
            vertex(i) + in_t(i),
            vertex(i),
        );
    }
    if raw.c {
        let last = raw.v.len() - 1;
        path.curve_to(vertex(last) + out_t(last), vertex(0) + in_t(0), vertex(0));
        path.close_path();
    }
    Some(path)
}

fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::new(
        1.0,
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    ))
}
