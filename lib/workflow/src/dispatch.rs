//! Node dispatch gateway.
//!
//! Resolves what a node needs before its adapter may run, then calls the
//! adapter under a timeout. Checks happen in this order:
//!
//! 1. Trigger nodes skip straight to the adapter.
//! 2. The integration configuration for the node kind must exist and be valid.
//! 3. The node's parameters must be marked configured.
//! 4. An adapter must be registered for the kind.
//!
//! `{{key}}` placeholders in string parameters are filled from the
//! execution context before the call.

use crate::context::ExecutionContext;
use crate::node::Node;
use nodeflow_integration::{
    AdapterError, AdapterRegistry, AdapterRequest, IntegrationConfigStore,
};
use regex_lite::{Captures, Regex};
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Default bound on a single adapter call.
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatches nodes to their adapters.
#[derive(Clone)]
pub struct Dispatcher {
    adapters: AdapterRegistry,
    configs: Arc<dyn IntegrationConfigStore>,
    timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher with the default timeout.
    #[must_use]
    pub fn new(adapters: AdapterRegistry, configs: Arc<dyn IntegrationConfigStore>) -> Self {
        Self {
            adapters,
            configs,
            timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    /// Sets the adapter timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the adapter timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs a node's adapter and returns its result.
    ///
    /// The context is only read; storing the result is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns the categorized reason the node could not produce a result.
    pub async fn dispatch(
        &self,
        node: &Node,
        context: &ExecutionContext,
    ) -> Result<JsonValue, AdapterError> {
        let kind = node.kind.as_str();

        let config = if node.kind.is_trigger() {
            JsonValue::Null
        } else {
            let stored = self
                .configs
                .lookup(kind)
                .await
                .map_err(|e| AdapterError::failed(e.to_string()))?;
            let config = match stored {
                Some(config) if config.valid => config.config,
                _ => {
                    return Err(AdapterError::IntegrationNotConfigured {
                        kind: kind.to_string(),
                    });
                }
            };
            if !node.configured_flag {
                return Err(AdapterError::ParametersNotConfigured {
                    node_id: node.id.to_string(),
                    kind: kind.to_string(),
                });
            }
            config
        };

        let adapter = self
            .adapters
            .get(kind)
            .ok_or_else(|| AdapterError::failed(format!("no adapter registered for kind {kind}")))?;

        let request = AdapterRequest::new(node.id.as_str(), kind)
            .with_label(node.label.clone())
            .with_parameters(interpolate_parameters(&node.parameters, context))
            .with_config(config)
            .with_context(context.snapshot());

        match tokio::time::timeout(self.timeout, adapter.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout {
                kind: kind.to_string(),
                after: self.timeout,
            }),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("adapters", &self.adapters)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Fills `{{key}}` placeholders in every string parameter.
#[must_use]
pub fn interpolate_parameters(
    parameters: &Map<String, JsonValue>,
    context: &ExecutionContext,
) -> Map<String, JsonValue> {
    parameters
        .iter()
        .map(|(key, value)| (key.clone(), interpolate_value(value, context)))
        .collect()
}

fn interpolate_value(value: &JsonValue, context: &ExecutionContext) -> JsonValue {
    match value {
        JsonValue::String(template) => JsonValue::String(interpolate_str(template, context)),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, context))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(interpolate_parameters(map, context)),
        other => other.clone(),
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid regex"))
}

/// Replaces `{{key}}` with the context value for `key`.
///
/// Keys are ASCII word characters. Unknown keys stay as written. String
/// values are inserted verbatim, anything else as JSON.
#[must_use]
pub fn interpolate_str(template: &str, context: &ExecutionContext) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| match context.read(&caps[1]) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nodeflow_integration::{Adapter, InMemoryConfigStore, IntegrationConfig};
    use serde_json::json;
    use std::sync::Mutex;

    /// Adapter that records every request it receives.
    struct RecordingAdapter {
        kind: String,
        requests: Arc<Mutex<Vec<AdapterRequest>>>,
    }

    #[async_trait]
    impl Adapter for RecordingAdapter {
        fn kind(&self) -> &str {
            &self.kind
        }

        async fn execute(&self, request: AdapterRequest) -> Result<JsonValue, AdapterError> {
            self.requests.lock().unwrap().push(request);
            Ok(json!({"success": true}))
        }
    }

    struct SlowAdapter;

    #[async_trait]
    impl Adapter for SlowAdapter {
        fn kind(&self) -> &str {
            "slow"
        }

        async fn execute(&self, _request: AdapterRequest) -> Result<JsonValue, AdapterError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(JsonValue::Null)
        }
    }

    fn dispatcher_with(
        kind: &str,
        store: InMemoryConfigStore,
    ) -> (Dispatcher, Arc<Mutex<Vec<AdapterRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let adapters = AdapterRegistry::new().with_adapter(Arc::new(RecordingAdapter {
            kind: kind.to_string(),
            requests: Arc::clone(&requests),
        }));
        (Dispatcher::new(adapters, Arc::new(store)), requests)
    }

    #[tokio::test]
    async fn trigger_needs_no_configuration() {
        let (dispatcher, _) = dispatcher_with("telegram", InMemoryConfigStore::new());
        let result = dispatcher
            .dispatch(&Node::trigger("A"), &ExecutionContext::new())
            .await
            .expect("trigger dispatch");
        assert_eq!(result["nodeId"], "A");
    }

    #[tokio::test]
    async fn missing_configuration_skips_adapter() {
        let (dispatcher, requests) = dispatcher_with("telegram", InMemoryConfigStore::new());
        let err = dispatcher
            .dispatch(
                &Node::new("B", "telegram").configured(),
                &ExecutionContext::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AdapterError::IntegrationNotConfigured {
                kind: "telegram".to_string()
            }
        );
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_configuration_counts_as_missing() {
        let store = InMemoryConfigStore::new()
            .with(IntegrationConfig::new("telegram", json!({})).invalid());
        let (dispatcher, _) = dispatcher_with("telegram", store);
        let err = dispatcher
            .dispatch(
                &Node::new("B", "telegram").configured(),
                &ExecutionContext::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::IntegrationNotConfigured { .. }));
    }

    #[tokio::test]
    async fn unconfigured_parameters_skip_adapter() {
        let store = InMemoryConfigStore::new().with(IntegrationConfig::new("telegram", json!({})));
        let (dispatcher, requests) = dispatcher_with("telegram", store);
        let err = dispatcher
            .dispatch(&Node::new("B", "telegram"), &ExecutionContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::ParametersNotConfigured { .. }));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unregistered_kind_fails() {
        let store = InMemoryConfigStore::new().with(IntegrationConfig::new("gmail", json!({})));
        let (dispatcher, _) = dispatcher_with("telegram", store);
        let err = dispatcher
            .dispatch(&Node::new("G", "gmail").configured(), &ExecutionContext::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "no adapter registered for kind gmail");
    }

    #[tokio::test]
    async fn adapter_receives_interpolated_parameters_and_config() {
        let store = InMemoryConfigStore::new()
            .with(IntegrationConfig::new("telegram", json!({"chatId": "42"})));
        let (dispatcher, requests) = dispatcher_with("telegram", store);
        let mut context = ExecutionContext::new();
        context.write("name", json!("Ada"));

        let node = Node::new("B", "telegram")
            .with_param("message", json!("Hello {{name}}"))
            .configured();
        dispatcher.dispatch(&node, &context).await.expect("dispatch");

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].parameter_str("message"), Some("Hello Ada"));
        assert_eq!(requests[0].config_str("chatId"), Some("42"));
        assert_eq!(requests[0].context["name"], json!("Ada"));
    }

    #[tokio::test]
    async fn slow_adapter_times_out() {
        let store = InMemoryConfigStore::new().with(IntegrationConfig::new("slow", json!({})));
        let dispatcher = Dispatcher::new(
            AdapterRegistry::new().with_adapter(Arc::new(SlowAdapter)),
            Arc::new(store),
        )
        .with_timeout(Duration::from_millis(20));

        let err = dispatcher
            .dispatch(&Node::new("S", "slow").configured(), &ExecutionContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Timeout { .. }));
    }

    #[test]
    fn interpolation_replaces_known_keys() {
        let mut context = ExecutionContext::new();
        context.write("user", json!("ada"));
        context.write("count", json!(3));

        assert_eq!(
            interpolate_str("hi {{user}}, {{count}} new", &context),
            "hi ada, 3 new"
        );
    }

    #[test]
    fn interpolation_keeps_unknown_and_malformed_placeholders() {
        let context = ExecutionContext::new();
        assert_eq!(interpolate_str("{{missing}}", &context), "{{missing}}");
        assert_eq!(interpolate_str("{{ spaced }}", &context), "{{ spaced }}");
        assert_eq!(interpolate_str("open {{ only", &context), "open {{ only");
    }

    #[test]
    fn interpolation_keys_are_ascii_words() {
        let mut context = ExecutionContext::new();
        context.write("café", json!("X"));
        context.write("step_2", json!("done"));

        assert_eq!(interpolate_str("{{café}}", &context), "{{café}}");
        assert_eq!(interpolate_str("{{step_2}}!", &context), "done!");
    }

    #[test]
    fn interpolation_renders_objects_as_json() {
        let mut context = ExecutionContext::new();
        context.write("B_result", json!({"ok": true}));
        assert_eq!(
            interpolate_str("got {{B_result}}", &context),
            r#"got {"ok":true}"#
        );
    }

    #[test]
    fn interpolation_walks_nested_values() {
        let mut context = ExecutionContext::new();
        context.write("id", json!("7"));
        let mut params = Map::new();
        params.insert("rows".to_string(), json!([{"key": "{{id}}"}, 5]));

        let out = interpolate_parameters(&params, &context);
        assert_eq!(out["rows"], json!([{"key": "7"}, 5]));
    }
}
