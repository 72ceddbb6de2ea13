//! Adapter trait and registry.
//!
//! An adapter performs the side effect for one node kind (send a message,
//! call a webhook, run a query). The engine never knows what an adapter does;
//! it only hands over the node's parameters, the resolved integration
//! configuration and a snapshot of the run's execution context.

use crate::error::AdapterError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Kind name of trigger nodes.
pub const TRIGGER_KIND: &str = "trigger";

/// Everything an adapter receives for a single dispatch.
#[derive(Debug, Clone)]
pub struct AdapterRequest {
    /// Id of the node being dispatched.
    pub node_id: String,
    /// The node kind (also the integration name).
    pub kind: String,
    /// Display label of the node, if it has one.
    pub label: Option<String>,
    /// Node parameters after placeholder interpolation.
    pub parameters: Map<String, JsonValue>,
    /// Integration configuration for the kind. `Null` for triggers.
    pub config: JsonValue,
    /// Snapshot of the execution context at dispatch time.
    pub context: Map<String, JsonValue>,
}

impl AdapterRequest {
    /// Creates a request with empty parameters, config and context.
    #[must_use]
    pub fn new(node_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            kind: kind.into(),
            label: None,
            parameters: Map::new(),
            config: JsonValue::Null,
            context: Map::new(),
        }
    }

    /// Sets the node's display label.
    #[must_use]
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Sets the node parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Map<String, JsonValue>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the integration configuration.
    #[must_use]
    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.config = config;
        self
    }

    /// Sets the context snapshot.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, JsonValue>) -> Self {
        self.context = context;
        self
    }

    /// Returns a string parameter, if present.
    #[must_use]
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(JsonValue::as_str)
    }

    /// Returns a string value from the integration configuration, if present.
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(JsonValue::as_str)
    }
}

/// The side effect behind a node kind.
///
/// Adapters do not enforce a timeout themselves; the dispatch gateway wraps
/// every call with the configured bound.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The node kind this adapter serves.
    fn kind(&self) -> &str;

    /// Performs the side effect and returns its result value.
    ///
    /// # Errors
    ///
    /// Returns an error if the side effect fails.
    async fn execute(&self, request: AdapterRequest) -> Result<JsonValue, AdapterError>;
}

/// Built-in adapter for trigger nodes.
///
/// A trigger has no side effect; its result marks when the run fired.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerAdapter;

#[async_trait]
impl Adapter for TriggerAdapter {
    fn kind(&self) -> &str {
        TRIGGER_KIND
    }

    async fn execute(&self, request: AdapterRequest) -> Result<JsonValue, AdapterError> {
        Ok(json!({
            "success": true,
            "action": "triggered",
            "nodeId": request.node_id,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

/// Kind to adapter lookup.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Creates a registry holding only the built-in trigger adapter.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TriggerAdapter));
        registry
    }

    /// Creates a registry with no adapters at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registers an adapter under its kind, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.kind().to_string(), adapter);
    }

    /// Registers an adapter, builder style.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Looks up the adapter for a kind.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(kind).cloned()
    }

    /// Returns the registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
