//! Run status reporting.
//!
//! The reporter owns the observable record of one run. The traversal task
//! appends to it; pollers read snapshots of it concurrently. Each change is
//! also mirrored to `tracing` and published to an optional event sink.
//!
//! Once the run is terminal the record is frozen: later log lines and state
//! changes are dropped.

use crate::envelope::Envelope;
use crate::execution::{LogEntry, LogLevel, NodeRunState, RunEvent, RunSnapshot, RunStatus};
use crate::node::NodeId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeflow_core::{WorkflowId, WorkflowRunId};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Error returned by an event sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event sink failed: {}", self.message)
    }
}

impl std::error::Error for SinkError {}

/// Receiver of run events, e.g. durable execution history.
///
/// Failures are logged and never affect the run.
#[async_trait]
pub trait RunEventSink: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: Envelope<RunEvent>) -> Result<(), SinkError>;
}

/// Observable record of a single run.
#[derive(Clone)]
pub struct StatusReporter {
    run_id: WorkflowRunId,
    record: Arc<Mutex<RunSnapshot>>,
    sink: Option<Arc<dyn RunEventSink>>,
}

impl StatusReporter {
    /// Creates the record for a run in `Running` status.
    #[must_use]
    pub fn new(
        run_id: WorkflowRunId,
        workflow_id: WorkflowId,
        sink: Option<Arc<dyn RunEventSink>>,
    ) -> Self {
        Self {
            run_id,
            record: Arc::new(Mutex::new(RunSnapshot::started(run_id, workflow_id))),
            sink,
        }
    }

    /// The run this reporter belongs to.
    #[must_use]
    pub fn run_id(&self) -> WorkflowRunId {
        self.run_id
    }

    /// Publishes the run-started event.
    pub async fn announce_start(&self) {
        let (workflow_id, timestamp) =
            self.with_record(|record| (record.workflow_id, record.started_at));
        tracing::info!(run_id = %self.run_id, workflow_id = %workflow_id, "run started");
        self.publish(RunEvent::RunStarted {
            run_id: self.run_id,
            workflow_id,
            timestamp,
        })
        .await;
    }

    /// Appends a log entry.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>, node_id: Option<&NodeId>) {
        let message = message.into();
        let entry = self.with_record(|record| {
            if record.status.is_terminal() {
                return None;
            }
            let timestamp = monotonic_now(record.logs.last().map(|e| e.timestamp));
            let entry = LogEntry {
                timestamp,
                level,
                message,
                node_id: node_id.cloned(),
            };
            record.logs.push(entry.clone());
            Some(entry)
        });

        let Some(entry) = entry else {
            return;
        };
        self.trace(&entry);
        self.publish(RunEvent::Log {
            run_id: self.run_id,
            entry,
        })
        .await;
    }

    /// Records a node state change.
    pub async fn node_state(&self, node_id: &NodeId, state: NodeRunState) {
        let recorded = self.with_record(|record| {
            if record.status.is_terminal() {
                return false;
            }
            record.node_states.insert(node_id.clone(), state);
            true
        });

        if recorded {
            self.publish(RunEvent::NodeStateChanged {
                run_id: self.run_id,
                node_id: node_id.clone(),
                state,
                timestamp: Utc::now(),
            })
            .await;
        }
    }

    /// Marks the run successful. Returns false if it was already terminal.
    pub async fn complete(&self, output: Map<String, JsonValue>) -> bool {
        self.finish(RunStatus::Success, None, Some(output)).await
    }

    /// Marks the run failed. Returns false if it was already terminal.
    pub async fn fail(&self, message: impl Into<String>, output: Map<String, JsonValue>) -> bool {
        self.finish(RunStatus::Error, Some(message.into()), Some(output))
            .await
    }

    /// Marks the run stopped. Returns false if it was already terminal.
    pub async fn stop(&self) -> bool {
        self.finish(RunStatus::Stopped, None, None).await
    }

    async fn finish(
        &self,
        status: RunStatus,
        error: Option<String>,
        output: Option<Map<String, JsonValue>>,
    ) -> bool {
        let finished = self.with_record(|record| {
            if record.status.is_terminal() {
                return None;
            }
            let timestamp = monotonic_now(record.logs.last().map(|e| e.timestamp));
            record.status = status;
            record.completed_at = Some(timestamp);
            record.error.clone_from(&error);
            record.output = output;
            Some(timestamp)
        });

        let Some(timestamp) = finished else {
            return false;
        };

        match status {
            RunStatus::Error => tracing::error!(
                run_id = %self.run_id,
                error = error.as_deref().unwrap_or_default(),
                "run failed"
            ),
            _ => tracing::info!(run_id = %self.run_id, %status, "run finished"),
        }
        self.publish(RunEvent::RunFinished {
            run_id: self.run_id,
            status,
            error,
            timestamp,
        })
        .await;
        true
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.with_record(|record| record.status)
    }

    /// Full copy of the run record.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.with_record(|record| record.clone())
    }

    /// Copy of the run record holding only log entries after `offset`.
    #[must_use]
    pub fn snapshot_since(&self, offset: usize) -> RunSnapshot {
        self.with_record(|record| {
            let mut snapshot = record.clone();
            snapshot.logs = record.logs.iter().skip(offset).cloned().collect();
            snapshot
        })
    }

    fn with_record<R>(&self, f: impl FnOnce(&mut RunSnapshot) -> R) -> R {
        let mut record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut record)
    }

    fn trace(&self, entry: &LogEntry) {
        let node_id = entry.node_id.as_ref().map(NodeId::as_str);
        match entry.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(run_id = %self.run_id, node_id, "{}", entry.message);
            }
            LogLevel::Warning => {
                tracing::warn!(run_id = %self.run_id, node_id, "{}", entry.message);
            }
            LogLevel::Error => {
                tracing::error!(run_id = %self.run_id, node_id, "{}", entry.message);
            }
        }
    }

    async fn publish(&self, event: RunEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.publish(Envelope::new(event)).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to publish run event");
        }
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("run_id", &self.run_id)
            .field("status", &self.status())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Current time, strictly after `previous`.
fn monotonic_now(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if previous >= now => previous + chrono::Duration::nanoseconds(1),
        _ => now,
    }
}

/// Drops log entries an observer has already seen.
///
/// For pollers that re-read the whole log each time. Entries are identified
/// by node, message and timestamp.
#[derive(Debug, Default)]
pub struct PollDeduplicator {
    seen: HashSet<(Option<NodeId>, String, DateTime<Utc>)>,
}

impl PollDeduplicator {
    /// Creates an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entries not returned by an earlier call.
    pub fn fresh<'a>(&mut self, entries: &'a [LogEntry]) -> Vec<&'a LogEntry> {
        entries
            .iter()
            .filter(|entry| {
                self.seen.insert((
                    entry.node_id.clone(),
                    entry.message.clone(),
                    entry.timestamp,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory event sink for testing.
    #[derive(Default)]
    struct InMemoryEventSink {
        events: Mutex<Vec<Envelope<RunEvent>>>,
    }

    #[async_trait]
    impl RunEventSink for InMemoryEventSink {
        async fn publish(&self, event: Envelope<RunEvent>) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl RunEventSink for FailingSink {
        async fn publish(&self, _event: Envelope<RunEvent>) -> Result<(), SinkError> {
            Err(SinkError {
                message: "disk full".to_string(),
            })
        }
    }

    fn reporter(sink: Option<Arc<dyn RunEventSink>>) -> StatusReporter {
        StatusReporter::new(WorkflowRunId::new(), WorkflowId::new(), sink)
    }

    #[tokio::test]
    async fn log_is_ordered_and_published() {
        let sink = Arc::new(InMemoryEventSink::default());
        let reporter = reporter(Some(sink.clone() as Arc<dyn RunEventSink>));

        reporter.announce_start().await;
        reporter.log(LogLevel::Info, "first", None).await;
        reporter
            .log(LogLevel::Success, "second", Some(&NodeId::new("A")))
            .await;

        let snapshot = reporter.snapshot();
        assert_eq!(snapshot.logs.len(), 2);
        assert!(snapshot.logs[0].timestamp <= snapshot.logs[1].timestamp);
        assert_eq!(snapshot.logs[1].node_id, Some(NodeId::new("A")));

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0].payload, RunEvent::RunStarted { .. }));
    }

    #[tokio::test]
    async fn first_terminal_status_wins() {
        let reporter = reporter(None);

        assert!(reporter.stop().await);
        assert!(!reporter.fail("late failure", Map::new()).await);
        assert!(!reporter.complete(Map::new()).await);

        let snapshot = reporter.snapshot();
        assert_eq!(snapshot.status, RunStatus::Stopped);
        assert!(snapshot.error.is_none());
        assert!(snapshot.completed_at.is_some());
    }

    #[tokio::test]
    async fn terminal_record_is_frozen() {
        let reporter = reporter(None);
        reporter.complete(Map::new()).await;
        reporter.log(LogLevel::Info, "after the end", None).await;
        reporter
            .node_state(&NodeId::new("A"), NodeRunState::Executing)
            .await;

        let snapshot = reporter.snapshot();
        assert!(snapshot.logs.is_empty());
        assert!(snapshot.node_states.is_empty());
    }

    #[tokio::test]
    async fn failed_run_carries_message_and_output() {
        let reporter = reporter(None);
        let mut output = Map::new();
        output.insert("A_result".to_string(), serde_json::json!(1));

        reporter.fail("node G failed: boom", output).await;

        let snapshot = reporter.snapshot();
        assert_eq!(snapshot.status, RunStatus::Error);
        assert_eq!(snapshot.error.as_deref(), Some("node G failed: boom"));
        assert_eq!(snapshot.output.map(|o| o.len()), Some(1));
    }

    #[tokio::test]
    async fn sink_failures_do_not_affect_run() {
        let reporter = reporter(Some(Arc::new(FailingSink)));
        reporter.log(LogLevel::Info, "still recorded", None).await;
        assert!(reporter.complete(Map::new()).await);
        assert_eq!(reporter.snapshot().logs.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_since_skips_seen_entries() {
        let reporter = reporter(None);
        for message in ["one", "two", "three"] {
            reporter.log(LogLevel::Info, message, None).await;
        }

        let tail = reporter.snapshot_since(2);
        assert_eq!(tail.logs.len(), 1);
        assert_eq!(tail.logs[0].message, "three");
        assert!(reporter.snapshot_since(10).logs.is_empty());
    }

    #[test]
    fn timestamps_advance_past_a_later_previous() {
        let ahead = Utc::now() + chrono::Duration::seconds(5);
        let next = monotonic_now(Some(ahead));
        assert!(next > ahead);
        assert!(monotonic_now(Some(next)) > next);
    }

    #[tokio::test]
    async fn log_timestamps_strictly_increase() {
        let reporter = reporter(None);
        for i in 0..50 {
            reporter.log(LogLevel::Info, format!("entry {i}"), None).await;
        }
        reporter.complete(Map::new()).await;

        let snapshot = reporter.snapshot();
        assert!(snapshot.logs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        let last = snapshot.logs.last().expect("logs").timestamp;
        assert!(snapshot.completed_at.expect("completed") > last);
    }

    #[tokio::test]
    async fn deduplicator_returns_each_entry_once() {
        let reporter = reporter(None);
        reporter.log(LogLevel::Info, "one", None).await;
        let mut dedup = PollDeduplicator::new();

        let first = reporter.snapshot();
        assert_eq!(dedup.fresh(&first.logs).len(), 1);

        reporter.log(LogLevel::Warning, "two", None).await;
        let second = reporter.snapshot();
        let fresh = dedup.fresh(&second.logs);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].message, "two");
    }
}
