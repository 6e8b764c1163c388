//! Lumora lowers animation documents in the BodyMovin JSON dialect to a
//! composition graph and optimizes that graph in place.
//!
//! The pipeline is synchronous and single-threaded:
//!
//! - Parse bytes into a [`document::LottieComposition`], reporting anything
//!   noteworthy to an [`Issues`] collector
//! - Translate the document into a [`graph::Graph`]
//! - [`optimize`] the graph: a fixed-point suite of local rewrites that
//!   shrinks the tree without changing what it renders
//! - Hand the root to a downstream generator ([`CodegenConfiguration`]) or
//!   dump it for inspection ([`dump_yaml`])
#![forbid(unsafe_code)]

pub mod codegen;
pub mod document;
pub mod dump;
mod foundation;
pub mod graph;
mod issues;
mod optimize;
pub mod translate;

pub use crate::codegen::CodegenConfiguration;
pub use crate::document::{LottieComposition, parse_composition};
pub use crate::dump::dump_yaml;
pub use crate::foundation::core::{Affine, BezPath, Color, Point, Rect, Vec2, Vector3, Vector4};
pub use crate::foundation::error::{LumoraError, LumoraResult};
pub use crate::graph::{Graph, NodeId, NodeKind};
pub use crate::issues::{Issue, Issues};
pub use crate::optimize::optimize;
pub use crate::translate::translate;
