//! Run controller.
//!
//! Owns the lifecycle of runs:
//!
//! - At most one active run per workflow. A workflow's slot is taken when a
//!   run starts and released when its traversal task exits, so a stopped run
//!   whose adapter call is still in flight keeps the slot (`Stopping`).
//! - Each run gets a background task, a cancellation token and a
//!   [`StatusReporter`] that pollers read from.
//! - Stopping is cooperative: the token is checked between dispatches and the
//!   run is marked `stopped` immediately.
//! - Finished runs stay pollable until more than `max_finished_runs` have
//!   finished after them; the oldest are evicted first.

use crate::config::EngineConfig;
use crate::definition::Workflow;
use crate::dispatch::Dispatcher;
use crate::error::RunError;
use crate::execution::{LogLevel, RunSnapshot, RunStatus};
use crate::graph::WorkflowGraph;
use crate::reporter::{RunEventSink, StatusReporter};
use crate::traversal::{Traversal, TraversalOutcome};
use nodeflow_core::{Result as CoreResult, WorkflowId, WorkflowRunId};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Where a workflow is in its run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLifecycle {
    /// No run is active.
    Idle,
    /// A run is traversing.
    Running,
    /// Stop was requested; the traversal task has not exited yet.
    Stopping,
    /// The most recent run was stopped and its task has exited.
    Stopped,
}

struct RunHandle {
    workflow_id: WorkflowId,
    reporter: StatusReporter,
    cancel: CancellationToken,
    /// Closed when the traversal task exits.
    finished: watch::Receiver<()>,
}

#[derive(Default)]
struct Registry {
    active: HashMap<WorkflowId, WorkflowRunId>,
    latest: HashMap<WorkflowId, WorkflowRunId>,
    runs: HashMap<WorkflowRunId, RunHandle>,
    /// Runs whose task has exited, oldest first.
    finished: VecDeque<WorkflowRunId>,
}

impl Registry {
    /// Releases the workflow's slot and evicts the oldest finished runs
    /// beyond `keep`. Active runs are never in `finished`.
    fn finish(&mut self, workflow_id: WorkflowId, run_id: WorkflowRunId, keep: usize) {
        if self.active.get(&workflow_id) == Some(&run_id) {
            self.active.remove(&workflow_id);
        }
        self.finished.push_back(run_id);

        while self.finished.len() > keep {
            let Some(evicted) = self.finished.pop_front() else {
                break;
            };
            if let Some(handle) = self.runs.remove(&evicted) {
                if self.latest.get(&handle.workflow_id) == Some(&evicted) {
                    self.latest.remove(&handle.workflow_id);
                }
            }
            tracing::debug!(run_id = %evicted, "evicted finished run");
        }
    }
}

/// Releases the workflow's active slot when the traversal task exits,
/// including by panic.
struct ActiveSlot {
    registry: Arc<Mutex<Registry>>,
    workflow_id: WorkflowId,
    run_id: WorkflowRunId,
    keep_finished: usize,
    _finished: watch::Sender<()>,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish(self.workflow_id, self.run_id, self.keep_finished);
    }
}

/// Starts, stops and observes workflow runs.
#[derive(Clone)]
pub struct RunController {
    dispatcher: Arc<Dispatcher>,
    limits: Arc<EngineConfig>,
    sink: Option<Arc<dyn RunEventSink>>,
    registry: Arc<Mutex<Registry>>,
}

impl RunController {
    /// Creates a controller. The dispatcher's timeout is replaced by the
    /// adapter timeout in `limits`.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, limits: EngineConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher.with_timeout(limits.adapter_timeout())),
            limits: Arc::new(limits),
            sink: None,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Publishes every run's events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn RunEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validates the workflow's graph and starts a run in the background.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the workflow has an active run, or
    /// `InvalidGraph` if the graph is empty, repeats a node id or has a
    /// dangling edge. Nothing is dispatched in either case.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub fn start(&self, workflow: &Workflow) -> CoreResult<WorkflowRunId, RunError> {
        let workflow_id = workflow.id;
        let run_id = WorkflowRunId::new();
        let (finished_tx, finished_rx) = watch::channel(());
        let reporter = StatusReporter::new(run_id, workflow_id, self.sink.clone());
        let cancel = CancellationToken::new();

        let graph = {
            let mut registry = self.lock();
            if let Some(&active) = registry.active.get(&workflow_id) {
                return Err(RunError::AlreadyRunning {
                    workflow_id,
                    run_id: active,
                }
                .into());
            }

            let graph = WorkflowGraph::from_definition(&workflow.graph).map_err(|source| {
                RunError::InvalidGraph {
                    workflow_id,
                    source,
                }
            })?;

            registry.active.insert(workflow_id, run_id);
            registry.latest.insert(workflow_id, run_id);
            registry.runs.insert(
                run_id,
                RunHandle {
                    workflow_id,
                    reporter: reporter.clone(),
                    cancel: cancel.clone(),
                    finished: finished_rx,
                },
            );
            graph
        };

        let slot = ActiveSlot {
            registry: Arc::clone(&self.registry),
            workflow_id,
            run_id,
            keep_finished: self.limits.max_finished_runs,
            _finished: finished_tx,
        };
        let dispatcher = Arc::clone(&self.dispatcher);
        let limits = Arc::clone(&self.limits);

        tokio::spawn(async move {
            let _slot = slot;
            execute_run(graph, dispatcher, limits, reporter, cancel).await;
        });

        tracing::info!(%run_id, node_count = workflow.graph.nodes.len(), "run scheduled");
        Ok(run_id)
    }

    /// Requests a run to stop and returns its status afterwards.
    ///
    /// Stopping a terminal run changes nothing and returns its status.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for an unknown or evicted run id.
    #[instrument(skip(self))]
    pub async fn stop(&self, run_id: WorkflowRunId) -> CoreResult<RunStatus, RunError> {
        let (reporter, cancel) = {
            let registry = self.lock();
            let handle = registry
                .runs
                .get(&run_id)
                .ok_or(RunError::RunNotFound { run_id })?;
            (handle.reporter.clone(), handle.cancel.clone())
        };

        if reporter.status().is_terminal() {
            return Ok(reporter.status());
        }

        cancel.cancel();
        reporter
            .log(LogLevel::Warning, "Execution stopped by user", None)
            .await;
        reporter.stop().await;
        Ok(reporter.status())
    }

    /// Returns the run's status and every log entry since it started.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for an unknown or evicted run id.
    pub fn poll(&self, run_id: WorkflowRunId) -> CoreResult<RunSnapshot, RunError> {
        Ok(self.reporter(run_id)?.snapshot())
    }

    /// Like [`poll`](Self::poll), but only log entries after the first
    /// `offset` are returned.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for an unknown or evicted run id.
    pub fn poll_since(
        &self,
        run_id: WorkflowRunId,
        offset: usize,
    ) -> CoreResult<RunSnapshot, RunError> {
        Ok(self.reporter(run_id)?.snapshot_since(offset))
    }

    /// Waits for the run's traversal task to exit and returns the final
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for an unknown or evicted run id.
    pub async fn wait(&self, run_id: WorkflowRunId) -> CoreResult<RunSnapshot, RunError> {
        let (reporter, mut finished) = {
            let registry = self.lock();
            let handle = registry
                .runs
                .get(&run_id)
                .ok_or(RunError::RunNotFound { run_id })?;
            (handle.reporter.clone(), handle.finished.clone())
        };

        // Resolves with an error once the sender in the task's slot is dropped.
        while finished.changed().await.is_ok() {}

        if !reporter.status().is_terminal() {
            reporter
                .fail("run task ended without finishing", Map::new())
                .await;
        }
        Ok(reporter.snapshot())
    }

    /// The lifecycle state of a workflow.
    #[must_use]
    pub fn lifecycle(&self, workflow_id: WorkflowId) -> RunLifecycle {
        let registry = self.lock();
        if let Some(handle) = registry
            .active
            .get(&workflow_id)
            .and_then(|run_id| registry.runs.get(run_id))
        {
            return if handle.cancel.is_cancelled() {
                RunLifecycle::Stopping
            } else {
                RunLifecycle::Running
            };
        }

        match registry
            .latest
            .get(&workflow_id)
            .and_then(|run_id| registry.runs.get(run_id))
        {
            Some(handle) if handle.reporter.status() == RunStatus::Stopped => RunLifecycle::Stopped,
            _ => RunLifecycle::Idle,
        }
    }

    /// The workflow's active run, if any.
    #[must_use]
    pub fn active_run(&self, workflow_id: WorkflowId) -> Option<WorkflowRunId> {
        self.lock().active.get(&workflow_id).copied()
    }

    /// The workflow a run belongs to.
    #[must_use]
    pub fn workflow_of(&self, run_id: WorkflowRunId) -> Option<WorkflowId> {
        self.lock().runs.get(&run_id).map(|handle| handle.workflow_id)
    }

    fn reporter(&self, run_id: WorkflowRunId) -> Result<StatusReporter, RunError> {
        self.lock()
            .runs
            .get(&run_id)
            .map(|handle| handle.reporter.clone())
            .ok_or(RunError::RunNotFound { run_id })
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("dispatcher", &self.dispatcher)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[instrument(skip_all, fields(run_id = %reporter.run_id()))]
async fn execute_run(
    graph: WorkflowGraph,
    dispatcher: Arc<Dispatcher>,
    limits: Arc<EngineConfig>,
    reporter: StatusReporter,
    cancel: CancellationToken,
) {
    reporter.announce_start().await;

    let mut traversal = Traversal::new(&graph, &dispatcher, &reporter, &limits, &cancel);
    let outcome = traversal.run().await;
    let output = traversal.into_context().into_values();

    match outcome {
        TraversalOutcome::Completed => {
            reporter
                .log(LogLevel::Success, "Workflow completed successfully", None)
                .await;
            reporter.complete(output).await;
        }
        TraversalOutcome::Failed(err) => {
            reporter
                .log(LogLevel::Error, format!("Workflow failed: {err}"), None)
                .await;
            reporter.fail(err.to_string(), output).await;
        }
        TraversalOutcome::Cancelled => {
            reporter.stop().await;
        }
    }
}
