//! Configuration handed to a downstream factory-source generator.
//!
//! The generator itself lives outside this crate; it consumes the optimized
//! graph root plus this configuration.

use crate::graph::{Graph, NodeId};

#[derive(Debug, Clone)]
pub struct CodegenConfiguration {
    /// Name of the generated factory class.
    pub class_name: String,
    pub namespace: String,
    pub width: f64,
    pub height: f64,
    /// Composition duration in seconds.
    pub duration_secs: f64,
    /// Skip the optimizer and emit the translated graph as-is.
    pub disable_optimization: bool,
    /// Free-form provenance lines emitted as comments in the output.
    pub source_metadata: Vec<String>,
}

impl CodegenConfiguration {
    pub fn new(class_name: impl Into<String>, width: f64, height: f64, duration_secs: f64) -> Self {
        Self {
            class_name: class_name.into(),
            namespace: "AnimatedVisuals".to_owned(),
            width,
            height,
            duration_secs,
            disable_optimization: false,
            source_metadata: Vec::new(),
        }
    }

    /// The nodes a generator has to emit, in a stable preorder.
    pub fn object_graph(&self, graph: &Graph) -> Vec<NodeId> {
        graph.collect_live()
    }
}
