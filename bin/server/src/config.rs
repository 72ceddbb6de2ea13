//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional file (TOML, YAML or JSON,
//! picked by extension) and `NODEFLOW__*` environment variables, which take
//! precedence. Nested keys use `__`, e.g. `NODEFLOW__ENGINE__MAX_LOOPS=10`.

use nodeflow_integration::{InMemoryConfigStore, IntegrationConfig};
use nodeflow_workflow::EngineConfig;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Directory holding workflow definitions, one JSON file each.
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,

    /// Run bounds.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Integration configuration keyed by node kind.
    #[serde(default)]
    pub integrations: HashMap<String, IntegrationSettings>,
}

/// Configuration of one integration.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationSettings {
    /// Whether the stored configuration is usable.
    /// Set to false to keep the entry but have nodes fail as not configured.
    #[serde(default = "default_valid")]
    pub valid: bool,

    /// Opaque settings handed to the adapter.
    #[serde(default)]
    pub config: JsonValue,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from("workflows")
}

fn default_valid() -> bool {
    true
}

impl ServerConfig {
    /// Loads configuration from `file` (if given) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the configuration is
    /// invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("NODEFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builds the integration configuration store.
    #[must_use]
    pub fn integration_store(&self) -> InMemoryConfigStore {
        self.integrations
            .iter()
            .map(|(kind, settings)| {
                let config = IntegrationConfig::new(kind.as_str(), settings.config.clone());
                if settings.valid { config } else { config.invalid() }
            })
            .collect()
    }
}
