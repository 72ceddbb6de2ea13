//! Integration contracts for the nodeflow engine.
//!
//! This crate provides:
//!
//! - **Adapter trait**: the side effect behind each node kind
//! - **Adapter registry**: kind to adapter lookup, with a built-in trigger
//! - **Configuration store**: resolved per-kind integration settings

pub mod adapter;
pub mod config_store;
pub mod error;

pub use adapter::{Adapter, AdapterRegistry, AdapterRequest, TRIGGER_KIND, TriggerAdapter};
pub use config_store::{InMemoryConfigStore, IntegrationConfig, IntegrationConfigStore};
pub use error::{AdapterError, ConfigStoreError};
