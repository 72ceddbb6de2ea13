//! Edge types for workflow graphs.
//!
//! Normal edges are followed when the source node succeeds; error-handler
//! edges only when it fails.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// When an edge is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Followed after the source node succeeds.
    #[default]
    Normal,
    /// Followed only after the source node fails.
    #[serde(alias = "error")]
    ErrorHandler,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge id from the definition.
    pub id: String,
    /// Node the edge leaves.
    pub source: NodeId,
    /// Node the edge enters.
    pub target: NodeId,
    /// When the edge is followed.
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    /// Creates a normal edge.
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: NodeId::new(source),
            target: NodeId::new(target),
            kind: EdgeKind::Normal,
        }
    }

    /// Creates an error-handler edge.
    #[must_use]
    pub fn error_handler(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            kind: EdgeKind::ErrorHandler,
            ..Self::new(id, source, target)
        }
    }

    /// Returns true if this edge routes failures.
    #[must_use]
    pub fn is_error_handler(&self) -> bool {
        self.kind == EdgeKind::ErrorHandler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_defaults_to_normal() {
        let edge: Edge =
            serde_json::from_value(json!({"id": "e1", "source": "A", "target": "B"}))
                .expect("deserialize");
        assert_eq!(edge.kind, EdgeKind::Normal);
    }

    #[test]
    fn error_alias_is_accepted() {
        let edge: Edge = serde_json::from_value(
            json!({"id": "e1", "source": "D", "target": "F", "kind": "error"}),
        )
        .expect("deserialize");
        assert!(edge.is_error_handler());
    }

    #[test]
    fn error_handler_serializes_kebab_case() {
        let json = serde_json::to_value(Edge::error_handler("e", "D", "F")).expect("serialize");
        assert_eq!(json["kind"], "error-handler");
    }
}
