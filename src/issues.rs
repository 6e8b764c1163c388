//! Collect-only issue reporting.
//!
//! Parsing and translation record anything noteworthy here; nothing in the
//! pipeline reads the collection back, and the optimizer never writes to it.

use std::fmt;

/// One recorded issue: a short stable code plus a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub code: &'static str,
    pub description: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

/// Accumulates [`Issue`]s during parsing and translation.
#[derive(Debug, Default)]
pub struct Issues {
    entries: Vec<Issue>,
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, code: &'static str, description: impl Into<String>) {
        self.entries.push(Issue {
            code,
            description: description.into(),
        });
    }

    pub fn unsupported_layer_type(&mut self, ty: impl fmt::Display) {
        self.report("LM0010", format!("unsupported layer type: {ty}"));
    }

    pub fn unsupported_shape_item(&mut self, ty: impl fmt::Display) {
        self.report("LM0011", format!("unsupported shape item: {ty}"));
    }

    pub fn unexpected_value(&mut self, context: &str, detail: impl fmt::Display) {
        self.report("LM0020", format!("unexpected value in {context}: {detail}"));
    }

    pub fn missing_asset(&mut self, id: &str) {
        self.report("LM0030", format!("referenced asset not found: {id}"));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.entries.iter()
    }
}
