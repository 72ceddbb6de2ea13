//! Core types shared by every nodeflow crate.
//!
//! Provides the strongly-typed identifiers for workflows and runs, plus the
//! rootcause-backed `Result` alias used at crate boundaries.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, WorkflowId, WorkflowRunId};
