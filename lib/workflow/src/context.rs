//! Run-scoped execution context.
//!
//! A flat key/value blackboard shared by every branch of a run. Results are
//! stored under `{nodeId}_result` and `{kind}_result`; later writes overwrite
//! earlier ones and nothing is rolled back when a branch fails.

use crate::node::Node;
use serde_json::{Map, Value as JsonValue};

/// Key/value store of intermediate results for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    values: Map<String, JsonValue>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value, replacing any previous one.
    pub fn write(&mut self, key: impl Into<String>, value: JsonValue) {
        self.values.insert(key.into(), value);
    }

    /// Reads a value.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Stores a node's result under its id key and its kind key.
    pub fn record_result(&mut self, node: &Node, result: JsonValue) {
        self.write(result_key(node.id.as_str()), result.clone());
        self.write(result_key(node.kind.as_str()), result);
    }

    /// Returns a copy of the current values.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, JsonValue> {
        self.values.clone()
    }

    /// Number of keys written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the context, returning its values.
    #[must_use]
    pub fn into_values(self) -> Map<String, JsonValue> {
        self.values
    }
}

/// Context key under which results for `name` are stored.
#[must_use]
pub fn result_key(name: &str) -> String {
    format!("{name}_result")
}
