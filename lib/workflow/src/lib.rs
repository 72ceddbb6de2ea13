//! Workflow execution engine for nodeflow.
//!
//! This crate runs user-defined workflows, including:
//!
//! - **Graph Model**: Directed graphs using petgraph with typed nodes and edges
//! - **Start Resolution**: Entry nodes derived from triggers and in-degree
//! - **Traversal**: Depth-first walk with error-handler routing, loop and depth limits
//! - **Dispatch**: Configuration checks, parameter interpolation and adapter timeouts
//! - **Runs**: Lifecycle control, status reporting and versioned run events

pub mod config;
pub mod context;
pub mod controller;
pub mod definition;
pub mod dispatch;
pub mod edge;
pub mod envelope;
pub mod error;
pub mod execution;
pub mod graph;
pub mod node;
pub mod reporter;
mod traversal;

pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use controller::{RunController, RunLifecycle};
pub use definition::{Workflow, WorkflowMetadata, WorkflowSummary};
pub use dispatch::Dispatcher;
pub use edge::{Edge, EdgeKind};
pub use envelope::Envelope;
pub use error::{ExecutionError, GraphError, RunError};
pub use execution::{LogEntry, LogLevel, NodeRunState, RunEvent, RunSnapshot, RunStatus};
pub use graph::{GraphDefinition, StartNodes, WorkflowGraph};
pub use node::{Node, NodeId, NodeKind};
pub use reporter::{PollDeduplicator, RunEventSink, SinkError, StatusReporter};
