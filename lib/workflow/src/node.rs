//! Node types for workflow graphs.
//!
//! A node is one step of a workflow. Its `kind` names the integration whose
//! adapter performs the step ("telegram", "webhook", ...), or "trigger" for
//! entry points that have no side effect of their own.

use nodeflow_integration::TRIGGER_KIND;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Identifier of a node, unique within one graph.
///
/// Node ids come from the workflow definition, so they are plain strings
/// rather than generated ULIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The kind of a node: "trigger" or the name of an integration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKind(String);

impl NodeKind {
    /// Creates a node kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// The trigger kind.
    #[must_use]
    pub fn trigger() -> Self {
        Self::new(TRIGGER_KIND)
    }

    /// Returns true for trigger nodes.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.0 == TRIGGER_KIND
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A step in a workflow graph. Read-only during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique id within the graph.
    pub id: NodeId,
    /// Which adapter runs this node.
    #[serde(alias = "service")]
    pub kind: NodeKind,
    /// Adapter parameters. May be incomplete while the node is being edited.
    #[serde(default)]
    pub parameters: Map<String, JsonValue>,
    /// Whether the user finished filling in the parameters.
    #[serde(default, alias = "parametersConfigured")]
    pub configured_flag: bool,
    /// Display ordinal of the step.
    #[serde(default)]
    pub step_label: u32,
    /// Optional human-readable name used in run logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Node {
    /// Creates an unconfigured node with no parameters.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            kind: NodeKind::new(kind),
            parameters: Map::new(),
            configured_flag: false,
            step_label: 0,
            label: None,
        }
    }

    /// Creates a trigger node.
    #[must_use]
    pub fn trigger(id: impl Into<String>) -> Self {
        Self::new(id, TRIGGER_KIND)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Marks the parameters as configured.
    #[must_use]
    pub fn configured(mut self) -> Self {
        self.configured_flag = true;
        self
    }

    /// Sets the step ordinal.
    #[must_use]
    pub fn with_step_label(mut self, step_label: u32) -> Self {
        self.step_label = step_label;
        self
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Name used for this node in run logs.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }
}
