//! Graph traversal engine.
//!
//! Walks the graph depth-first from each start node in turn. Siblings run
//! sequentially in edge definition order, so the only suspension point is
//! node dispatch. The walk is iterative: pending branches live on an
//! explicit stack, each frame carrying its depth and the chain of nodes
//! already visited on that branch.
//!
//! Per frame:
//!
//! 1. A frame deeper than `max_depth` halts its branch with a warning.
//! 2. A node already on the branch counts as a loop iteration. Once it has
//!    looped `max_loops` times in this run the branch halts with a warning.
//! 3. The node is dispatched. On success its result goes into the context
//!    and every normal edge target is queued. On failure every error-handler
//!    target is queued instead; with no handler the whole run fails.

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::dispatch::Dispatcher;
use crate::edge::EdgeKind;
use crate::error::ExecutionError;
use crate::execution::{LogLevel, NodeRunState};
use crate::graph::{Adjacency, WorkflowGraph};
use crate::node::{Node, NodeId};
use crate::reporter::StatusReporter;
use nodeflow_core::WorkflowRunId;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a traversal ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TraversalOutcome {
    /// Every branch of every start node finished.
    Completed,
    /// A node failed without an error handler.
    Failed(ExecutionError),
    /// Cancellation was observed between dispatches.
    Cancelled,
}

/// Why a single branch stopped early. Never fatal to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchHalt {
    DepthExceeded { max_depth: usize },
    LoopLimitExceeded { max_loops: u32 },
}

impl fmt::Display for BranchHalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepthExceeded { max_depth } => {
                write!(f, "maximum execution depth ({max_depth}) reached")
            }
            Self::LoopLimitExceeded { max_loops } => {
                write!(f, "maximum loop iterations ({max_loops}) reached")
            }
        }
    }
}

/// Visit counts per node for one run.
#[derive(Debug)]
struct LoopCounters {
    run_id: WorkflowRunId,
    counts: HashMap<NodeId, u32>,
}

impl LoopCounters {
    fn new(run_id: WorkflowRunId) -> Self {
        Self {
            run_id,
            counts: HashMap::new(),
        }
    }

    /// Counts another loop iteration of `node_id`.
    ///
    /// Returns the iteration number, or `None` once `max_loops` is reached.
    fn enter(&mut self, node_id: &NodeId, max_loops: u32) -> Option<u32> {
        let count = self.counts.entry(node_id.clone()).or_insert(0);
        if *count >= max_loops {
            tracing::debug!(run_id = %self.run_id, node_id = %node_id, count = *count, "loop limit hit");
            return None;
        }
        *count += 1;
        Some(*count)
    }
}

/// Persistent list of the nodes visited on a branch.
///
/// Sibling branches share their common prefix; pushing never disturbs
/// another branch's view.
#[derive(Debug)]
struct PathLink {
    node: NodeIndex,
    parent: Option<Arc<PathLink>>,
}

type Path = Option<Arc<PathLink>>;

fn path_push(path: &Path, node: NodeIndex) -> Path {
    Some(Arc::new(PathLink {
        node,
        parent: path.clone(),
    }))
}

fn path_contains(path: &Path, node: NodeIndex) -> bool {
    let mut current = path.as_deref();
    while let Some(link) = current {
        if link.node == node {
            return true;
        }
        current = link.parent.as_deref();
    }
    false
}

#[derive(Debug)]
struct Frame {
    node: NodeIndex,
    depth: usize,
    path: Path,
}

/// One run's walk over a graph.
pub(crate) struct Traversal<'a> {
    graph: &'a WorkflowGraph,
    adjacency: Adjacency,
    dispatcher: &'a Dispatcher,
    reporter: &'a StatusReporter,
    limits: &'a EngineConfig,
    cancel: &'a CancellationToken,
    loops: LoopCounters,
    context: ExecutionContext,
}

impl<'a> Traversal<'a> {
    pub(crate) fn new(
        graph: &'a WorkflowGraph,
        dispatcher: &'a Dispatcher,
        reporter: &'a StatusReporter,
        limits: &'a EngineConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            graph,
            adjacency: graph.adjacency(),
            dispatcher,
            reporter,
            limits,
            cancel,
            loops: LoopCounters::new(reporter.run_id()),
            context: ExecutionContext::new(),
        }
    }

    /// Walks every start node and its descendants.
    pub(crate) async fn run(&mut self) -> TraversalOutcome {
        let graph = self.graph;
        let start = graph.start_nodes();
        if start.used_fallback() {
            self.reporter
                .log(
                    LogLevel::Warning,
                    "No explicit start node found, using first node",
                    None,
                )
                .await;
        }
        self.reporter
            .log(
                LogLevel::Info,
                format!("Starting execution from {} start node(s)", start.len()),
                None,
            )
            .await;

        let mut stack: Vec<Frame> = start
            .indices()
            .iter()
            .rev()
            .map(|&node| Frame {
                node,
                depth: 0,
                path: None,
            })
            .collect();

        while let Some(frame) = stack.pop() {
            if self.cancel.is_cancelled() {
                return TraversalOutcome::Cancelled;
            }

            let node = graph.node_at(frame.node);

            if frame.depth > self.limits.max_depth {
                self.halt(
                    node,
                    BranchHalt::DepthExceeded {
                        max_depth: self.limits.max_depth,
                    },
                )
                .await;
                continue;
            }

            let path = if path_contains(&frame.path, frame.node) {
                match self.loops.enter(&node.id, self.limits.max_loops) {
                    Some(iteration) => {
                        self.reporter
                            .log(
                                LogLevel::Info,
                                format!("Loop iteration {iteration} for {}", node.display_name()),
                                Some(&node.id),
                            )
                            .await;
                        frame.path
                    }
                    None => {
                        self.halt(
                            node,
                            BranchHalt::LoopLimitExceeded {
                                max_loops: self.limits.max_loops,
                            },
                        )
                        .await;
                        continue;
                    }
                }
            } else {
                path_push(&frame.path, frame.node)
            };

            let next = match self.execute(node).await {
                Ok(()) => self.adjacency.targets(frame.node, EdgeKind::Normal),
                Err(reason) => {
                    let handlers = self.adjacency.targets(frame.node, EdgeKind::ErrorHandler);
                    if handlers.is_empty() {
                        return TraversalOutcome::Failed(ExecutionError::NodeFailed {
                            node_id: node.id.clone(),
                            reason,
                        });
                    }
                    self.reporter
                        .log(
                            LogLevel::Warning,
                            format!(
                                "Routing failure of {} to {} error handler(s)",
                                node.display_name(),
                                handlers.len()
                            ),
                            Some(&node.id),
                        )
                        .await;
                    handlers
                }
            };

            stack.extend(next.into_iter().rev().map(|target| Frame {
                node: target,
                depth: frame.depth + 1,
                path: path.clone(),
            }));
        }

        TraversalOutcome::Completed
    }

    /// Dispatches one node and reports the result. Returns the failure text.
    async fn execute(&mut self, node: &Node) -> Result<(), String> {
        self.reporter
            .node_state(&node.id, NodeRunState::Executing)
            .await;
        self.reporter
            .log(
                LogLevel::Info,
                format!("Executing {} ({})", node.display_name(), node.kind),
                Some(&node.id),
            )
            .await;

        match self.dispatcher.dispatch(node, &self.context).await {
            Ok(result) => {
                self.context.record_result(node, result);
                self.reporter
                    .node_state(&node.id, NodeRunState::Success)
                    .await;
                self.reporter
                    .log(
                        LogLevel::Success,
                        format!("{} completed", node.display_name()),
                        Some(&node.id),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                self.reporter
                    .node_state(&node.id, NodeRunState::Error)
                    .await;
                self.reporter
                    .log(
                        LogLevel::Error,
                        format!("{} failed: {e}", node.display_name()),
                        Some(&node.id),
                    )
                    .await;
                Err(e.to_string())
            }
        }
    }

    async fn halt(&self, node: &Node, reason: BranchHalt) {
        self.reporter
            .log(
                LogLevel::Warning,
                format!("Branch halted at {}: {reason}", node.display_name()),
                Some(&node.id),
            )
            .await;
    }

    /// Consumes the traversal, returning the final execution context.
    pub(crate) fn into_context(self) -> ExecutionContext {
        self.context
    }
}
