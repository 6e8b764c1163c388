//! Reverse index over the composition graph.
//!
//! Built in a single walk from the root. Answers two queries: the owning
//! parent of a node, and the non-owning in-references into a node (from
//! expression-animation parameters and visual-surface sources). The index is
//! rebuilt on demand after a batch of rewrites; the elision helpers patch
//! parent entries incrementally for the nodes they touch so consecutive
//! rewrites within one pass can run without a full rebuild.

use smallvec::SmallVec;

use super::{Graph, NodeId, NodeKind};

#[derive(Debug)]
pub struct GraphIndex {
    parent: Vec<Option<NodeId>>,
    in_refs: Vec<SmallVec<[NodeId; 2]>>,
}

impl GraphIndex {
    pub fn build(graph: &Graph) -> Self {
        let n = graph.arena_len();
        let mut index = Self {
            parent: vec![None; n],
            in_refs: vec![SmallVec::new(); n],
        };

        for id in graph.collect_live() {
            let mut record = |child: NodeId| {
                index.parent[child.index()] = Some(id);
            };
            graph.for_each_owned_child(id, &mut record);

            match graph.kind(id) {
                NodeKind::ExpressionAnimation(e) => {
                    for &(_, target) in &e.references {
                        index.in_refs[target.index()].push(id);
                    }
                }
                NodeKind::VisualSurface(s) => {
                    if let Some(source) = s.source_visual {
                        index.in_refs[source.index()].push(id);
                    }
                }
                _ => {}
            }
        }

        index
    }

    /// The owning parent of `id`, or `None` for the root and for nodes no
    /// longer reachable.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent[id.index()]
    }

    /// Non-owning references into `id` (the referring nodes).
    pub fn in_references(&self, id: NodeId) -> &[NodeId] {
        &self.in_refs[id.index()]
    }

    pub fn has_in_references(&self, id: NodeId) -> bool {
        !self.in_refs[id.index()].is_empty()
    }

    /// Whether `id` is the source of any `VisualSurface`.
    ///
    /// Transform properties must never be hoisted onto such a node; the
    /// runtime ignores them there.
    pub fn is_visual_surface_source(&self, graph: &Graph, id: NodeId) -> bool {
        self.in_refs[id.index()]
            .iter()
            .any(|&referer| matches!(graph.kind(referer), NodeKind::VisualSurface(_)))
    }

    /// Incremental parent patch used by the elision helpers between rebuilds.
    pub(crate) fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) {
        self.parent[child.index()] = parent;
    }
}
