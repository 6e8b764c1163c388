//! YAML-style human-inspection dump of a composition graph.
//!
//! One mapping per node: its kind, set slots, animators, and children.
//! Written for eyeballs, not machines; round-tripping is a non-goal.

use std::io::{self, Write};

use crate::foundation::core::Affine;
use crate::graph::{Graph, NodeId, NodeKind};

/// Write the graph rooted at [`Graph::root`] as an indented YAML-style tree.
pub fn dump_yaml<W: Write>(graph: &Graph, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "composition:")?;
    dump_node(graph, graph.root(), writer, 1)
}

fn indent<W: Write>(writer: &mut W, depth: usize) -> io::Result<()> {
    for _ in 0..depth {
        write!(writer, "  ")?;
    }
    Ok(())
}

fn dump_node<W: Write>(
    graph: &Graph,
    id: NodeId,
    writer: &mut W,
    depth: usize,
) -> io::Result<()> {
    let node = graph.node(id);
    indent(writer, depth)?;
    write!(writer, "- kind: {}", node.kind.name())?;
    if let Some(name) = &node.name {
        write!(writer, "  # {name}")?;
    }
    writeln!(writer)?;

    match &node.kind {
        NodeKind::ContainerVisual(_) | NodeKind::ShapeVisual(_) | NodeKind::SpriteVisual(_) => {
            let v = graph.visual(id);
            let t = &v.transform;
            if let Some(s) = v.size {
                field(writer, depth, "size", format_args!("[{}, {}]", s.x, s.y))?;
            }
            if let Some(o) = v.opacity {
                field(writer, depth, "opacity", format_args!("{o}"))?;
            }
            if let Some(vis) = v.is_visible {
                field(writer, depth, "is_visible", format_args!("{vis}"))?;
            }
            if let Some(c) = t.center_point {
                field(
                    writer,
                    depth,
                    "center_point",
                    format_args!("[{}, {}, {}]", c.x, c.y, c.z),
                )?;
            }
            if let Some(o) = t.offset {
                field(
                    writer,
                    depth,
                    "offset",
                    format_args!("[{}, {}, {}]", o.x, o.y, o.z),
                )?;
            }
            if let Some(r) = t.rotation_degrees {
                field(writer, depth, "rotation_degrees", format_args!("{r}"))?;
            }
            if let Some(s) = t.scale {
                field(
                    writer,
                    depth,
                    "scale",
                    format_args!("[{}, {}, {}]", s.x, s.y, s.z),
                )?;
            }
            if let Some(m) = t.transform_matrix {
                matrix_field(writer, depth, m)?;
            }
        }
        NodeKind::ContainerShape(_) | NodeKind::SpriteShape(_) => {
            let t = graph.shape_transform(id);
            if let Some(c) = t.center_point {
                field(writer, depth, "center_point", format_args!("[{}, {}]", c.x, c.y))?;
            }
            if let Some(o) = t.offset {
                field(writer, depth, "offset", format_args!("[{}, {}]", o.x, o.y))?;
            }
            if let Some(r) = t.rotation_degrees {
                field(writer, depth, "rotation_degrees", format_args!("{r}"))?;
            }
            if let Some(s) = t.scale {
                field(writer, depth, "scale", format_args!("[{}, {}]", s.x, s.y))?;
            }
            if let Some(m) = t.transform_matrix {
                matrix_field(writer, depth, m)?;
            }
        }
        NodeKind::ColorBrush(b) => {
            if let Some(c) = b.color {
                field(
                    writer,
                    depth,
                    "color",
                    format_args!("[a: {}, r: {}, g: {}, b: {}]", c.a, c.r, c.g, c.b),
                )?;
            }
        }
        NodeKind::InsetClip(c) => {
            field(
                writer,
                depth,
                "insets",
                format_args!("[{}, {}, {}, {}]", c.top, c.left, c.right, c.bottom),
            )?;
        }
        NodeKind::ExpressionAnimation(e) => {
            field(writer, depth, "expression", format_args!("{:?}", e.expression))?;
            for (name, target) in &e.references {
                field(
                    writer,
                    depth,
                    "reference",
                    format_args!("{{{name}: node {}}}", target.0),
                )?;
            }
        }
        NodeKind::KeyFrameAnimation(k) => {
            field(writer, depth, "lane", format_args!("{}", k.type_name()))?;
            field(writer, depth, "frames", format_args!("{}", k.frame_count()))?;
        }
        _ => {}
    }

    for animator in graph.animators(id) {
        indent(writer, depth + 1)?;
        writeln!(writer, "animate {}:", animator.target_property)?;
        dump_node(graph, animator.animation, writer, depth + 2)?;
    }

    let mut children = Vec::new();
    graph.for_each_owned_child(id, &mut |c| children.push(c));
    let mut animations = Vec::new();
    collect_animation_ids(graph, id, &mut animations);
    for child in children {
        if animations.contains(&child) {
            continue;
        }
        dump_node(graph, child, writer, depth + 1)?;
    }
    Ok(())
}

fn collect_animation_ids(graph: &Graph, id: NodeId, out: &mut Vec<NodeId>) {
    fn walk(animators: &[crate::graph::Animator], out: &mut Vec<NodeId>) {
        for a in animators {
            out.push(a.animation);
            if let Some(c) = &a.controller {
                walk(&c.animators, out);
            }
        }
    }
    walk(graph.animators(id), out);
}

fn field<W: Write>(
    writer: &mut W,
    depth: usize,
    name: &str,
    value: std::fmt::Arguments<'_>,
) -> io::Result<()> {
    indent(writer, depth + 1)?;
    writeln!(writer, "{name}: {value}")
}

fn matrix_field<W: Write>(writer: &mut W, depth: usize, m: Affine) -> io::Result<()> {
    let c = m.as_coeffs();
    field(
        writer,
        depth,
        "transform_matrix",
        format_args!("[{}, {}, {}, {}, {}, {}]", c[0], c[1], c[2], c[3], c[4], c[5]),
    )
}
