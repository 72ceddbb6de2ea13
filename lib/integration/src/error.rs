//! Error types for the integration crate.
//!
//! - `AdapterError`: why a single node dispatch failed
//! - `ConfigStoreError`: failures reaching the integration configuration store

use std::fmt;
use std::time::Duration;

/// Why a node dispatch failed.
///
/// Every variant is recoverable by the graph: the engine routes it to the
/// node's error-handler edges when there are any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// No usable integration configuration exists for the node kind.
    IntegrationNotConfigured { kind: String },
    /// The node's parameters have not been filled in.
    ParametersNotConfigured { node_id: String, kind: String },
    /// The adapter did not answer within the configured bound.
    Timeout { kind: String, after: Duration },
    /// The adapter ran and reported a failure.
    Failed { message: String },
}

impl AdapterError {
    /// Creates a `Failed` error from any message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntegrationNotConfigured { kind } => {
                write!(f, "integration not configured for {kind}")
            }
            Self::ParametersNotConfigured { node_id, kind } => {
                write!(f, "parameters not configured for {kind} node {node_id}")
            }
            Self::Timeout { kind, after } => {
                write!(f, "{kind} adapter timed out after {after:?}")
            }
            Self::Failed { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Errors from the integration configuration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStoreError {
    /// The backing store could not be read.
    Unavailable { reason: String },
}

impl fmt::Display for ConfigStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => {
                write!(f, "integration configuration store unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigStoreError {}
