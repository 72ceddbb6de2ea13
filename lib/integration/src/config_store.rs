//! Integration configuration lookup.
//!
//! Each node kind other than "trigger" needs a stored integration
//! configuration (tokens, URLs, connection settings) before its adapter can
//! run. The store itself is a collaborator; the engine only reads from it.

use crate::error::ConfigStoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A stored integration configuration for one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// The node kind this configuration serves.
    pub kind: String,
    /// Opaque settings handed to the adapter.
    #[serde(default)]
    pub config: JsonValue,
    /// Whether the configuration passed validation when it was saved.
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl IntegrationConfig {
    /// Creates a valid configuration.
    #[must_use]
    pub fn new(kind: impl Into<String>, config: JsonValue) -> Self {
        Self {
            kind: kind.into(),
            config,
            valid: true,
        }
    }

    /// Marks the configuration invalid.
    #[must_use]
    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }
}

/// Read access to integration configurations.
#[async_trait]
pub trait IntegrationConfigStore: Send + Sync {
    /// Returns the configuration for a kind, if one is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn lookup(&self, kind: &str) -> Result<Option<IntegrationConfig>, ConfigStoreError>;
}

/// Process-local configuration store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigStore {
    configs: Arc<RwLock<HashMap<String, IntegrationConfig>>>,
}

impl InMemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a configuration, replacing any previous one for the same kind.
    pub fn insert(&self, config: IntegrationConfig) {
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.kind.clone(), config);
    }

    /// Stores a configuration, builder style.
    #[must_use]
    pub fn with(self, config: IntegrationConfig) -> Self {
        self.insert(config);
        self
    }
}

impl FromIterator<IntegrationConfig> for InMemoryConfigStore {
    fn from_iter<I: IntoIterator<Item = IntegrationConfig>>(iter: I) -> Self {
        let store = Self::new();
        for config in iter {
            store.insert(config);
        }
        store
    }
}

#[async_trait]
impl IntegrationConfigStore for InMemoryConfigStore {
    async fn lookup(&self, kind: &str) -> Result<Option<IntegrationConfig>, ConfigStoreError> {
        let configs = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(configs.get(kind).cloned())
    }
}
