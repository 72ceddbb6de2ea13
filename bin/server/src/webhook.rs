//! Webhook adapter.
//!
//! Posts the run's execution context, plus the node's `payload` parameter
//! under `data`, to the integration's `webhookUrl` (or `webhook_url`).

use async_trait::async_trait;
use chrono::Utc;
use nodeflow_integration::{Adapter, AdapterError, AdapterRequest};
use reqwest::Client;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;

/// Kind name handled by [`WebhookAdapter`].
pub const WEBHOOK_KIND: &str = "webhook";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Adapter for `webhook` nodes.
#[derive(Debug, Clone)]
pub struct WebhookAdapter {
    client: Client,
}

impl WebhookAdapter {
    /// Creates an adapter with default client timeouts.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_HTTP_CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build webhook client, using defaults");
                Client::new()
            });
        Self { client }
    }

    /// Creates an adapter using an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for WebhookAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for WebhookAdapter {
    fn kind(&self) -> &str {
        WEBHOOK_KIND
    }

    async fn execute(&self, request: AdapterRequest) -> Result<JsonValue, AdapterError> {
        let url = request
            .config_str("webhookUrl")
            .or_else(|| request.config_str("webhook_url"))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AdapterError::failed("Webhook URL not configured"))?
            .to_string();

        let data = match request.parameters.get("payload") {
            None => json!({}),
            Some(JsonValue::String(raw)) => {
                serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.clone()))
            }
            Some(other) => other.clone(),
        };

        let mut body = request.context;
        body.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        body.insert(
            "workflowNode".into(),
            json!(request.label.unwrap_or(request.node_id)),
        );
        body.insert("data".into(), data);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::failed(format!("Webhook error: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::failed(format!("Webhook error: {e}")))?;

        if !status.is_success() {
            return Err(AdapterError::failed(format!(
                "Webhook error: HTTP {}: {text}",
                status.as_u16()
            )));
        }

        tracing::debug!(%url, status = status.as_u16(), "webhook delivered");

        let response_body = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
        Ok(json!({
            "success": true,
            "action": "webhook_triggered",
            "status": status.as_u16(),
            "response": response_body,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}
