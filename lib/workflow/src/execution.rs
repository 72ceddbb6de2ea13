//! Run state types.
//!
//! A run moves from `Running` to exactly one terminal status. Everything an
//! observer sees about a run (status, log, per-node state, final context)
//! is captured in a [`RunSnapshot`]; every change is also emitted as a
//! [`RunEvent`].

use crate::node::NodeId;
use chrono::{DateTime, Utc};
use nodeflow_core::{WorkflowId, WorkflowRunId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// The overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Traversal is in progress.
    Running,
    /// All branches finished without an unhandled failure.
    Success,
    /// A node failed with no error handler.
    Error,
    /// The run was stopped on request.
    Stopped,
}

impl RunStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One line of a run's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// When the entry was appended. Never earlier than the previous entry.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Node the entry is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

/// Execution state of a single node within a run.
///
/// Reflects the latest visit; a node revisited in a loop goes back to
/// `Executing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunState {
    Executing,
    Success,
    Error,
}

/// Point-in-time view of a run, as returned by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    /// The run.
    pub run_id: WorkflowRunId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// Current status.
    pub status: RunStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal status.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Log entries, oldest first.
    pub logs: Vec<LogEntry>,
    /// Failure message of an `error` run.
    #[serde(default)]
    pub error: Option<String>,
    /// Latest state per dispatched node.
    #[serde(default)]
    pub node_states: BTreeMap<NodeId, NodeRunState>,
    /// Execution context at the end of the run.
    #[serde(default)]
    pub output: Option<Map<String, JsonValue>>,
}

impl RunSnapshot {
    /// Creates the snapshot of a run that just started.
    #[must_use]
    pub fn started(run_id: WorkflowRunId, workflow_id: WorkflowId) -> Self {
        Self {
            run_id,
            workflow_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            logs: Vec::new(),
            error: None,
            node_states: BTreeMap::new(),
            output: None,
        }
    }

    /// Returns the run duration, if it has finished.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

/// Events emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run started.
    RunStarted {
        run_id: WorkflowRunId,
        workflow_id: WorkflowId,
        timestamp: DateTime<Utc>,
    },
    /// A log entry was appended.
    Log {
        run_id: WorkflowRunId,
        entry: LogEntry,
    },
    /// A node changed state.
    NodeStateChanged {
        run_id: WorkflowRunId,
        node_id: NodeId,
        state: NodeRunState,
        timestamp: DateTime<Utc>,
    },
    /// Run reached a terminal status.
    RunFinished {
        run_id: WorkflowRunId,
        status: RunStatus,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl RunEvent {
    /// Returns the run ID associated with this event.
    #[must_use]
    pub fn run_id(&self) -> WorkflowRunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::Log { run_id, .. }
            | Self::NodeStateChanged { run_id, .. }
            | Self::RunFinished { run_id, .. } => *run_id,
        }
    }

    /// Returns the timestamp of this event.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RunStarted { timestamp, .. }
            | Self::NodeStateChanged { timestamp, .. }
            | Self::RunFinished { timestamp, .. } => *timestamp,
            Self::Log { entry, .. } => entry.timestamp,
        }
    }
}
