//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GraphError`: validation failures of a graph definition
//! - `ExecutionError`: run-fatal failures raised during traversal
//! - `RunError`: run controller operations (wraps graph errors with the workflow)

use crate::node::NodeId;
use nodeflow_core::{WorkflowId, WorkflowRunId};
use std::fmt;

/// Errors from graph validation.
///
/// All of these are detected before any node is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The graph has no nodes.
    EmptyGraph,
    /// Two nodes share an id.
    DuplicateNode { node_id: NodeId },
    /// An edge references a node that does not exist.
    DanglingEdge { edge_id: String, node_id: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGraph => write!(f, "workflow graph has no nodes"),
            Self::DuplicateNode { node_id } => {
                write!(f, "duplicate node id: {node_id}")
            }
            Self::DanglingEdge { edge_id, node_id } => {
                write!(f, "edge '{edge_id}' references unknown node {node_id}")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Run-fatal failures raised during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// A node failed and has no error-handler edge.
    NodeFailed { node_id: NodeId, reason: String },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeFailed { node_id, reason } => {
                write!(f, "node {node_id} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Errors from run controller operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// A run for this workflow is still active.
    AlreadyRunning {
        workflow_id: WorkflowId,
        run_id: WorkflowRunId,
    },
    /// The workflow's graph failed validation.
    InvalidGraph {
        workflow_id: WorkflowId,
        source: GraphError,
    },
    /// No run with this id is known.
    RunNotFound { run_id: WorkflowRunId },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning {
                workflow_id,
                run_id,
            } => {
                write!(f, "workflow {workflow_id} is already running as {run_id}")
            }
            Self::InvalidGraph {
                workflow_id,
                source,
            } => {
                write!(f, "workflow {workflow_id} has an invalid graph: {source}")
            }
            Self::RunNotFound { run_id } => write!(f, "run not found: {run_id}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidGraph { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_edge_display() {
        let err = GraphError::DanglingEdge {
            edge_id: "e1".to_string(),
            node_id: NodeId::new("ghost"),
        };
        assert_eq!(err.to_string(), "edge 'e1' references unknown node ghost");
    }

    #[test]
    fn node_failed_references_node() {
        let err = ExecutionError::NodeFailed {
            node_id: NodeId::new("G"),
            reason: "integration not configured for slack".to_string(),
        };
        assert!(err.to_string().starts_with("node G failed"));
    }

    #[test]
    fn invalid_graph_exposes_source() {
        use std::error::Error;

        let err = RunError::InvalidGraph {
            workflow_id: WorkflowId::new(),
            source: GraphError::EmptyGraph,
        };
        assert!(err.to_string().contains("no nodes"));
        assert!(err.source().is_some());
    }
}
