//! Workflow definition types.
//!
//! A workflow instance pairs an id and descriptive metadata with the graph
//! definition that runs execute. Definitions are stored and edited elsewhere;
//! the engine only reads them.

use crate::graph::GraphDefinition;
use serde::{Deserialize, Serialize};
use nodeflow_core::WorkflowId;

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name for this workflow.
    pub name: String,
    /// Description of what this workflow does.
    #[serde(default)]
    pub description: Option<String>,
    /// Tags for organization/filtering.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WorkflowMetadata {
    /// Creates metadata with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            tags: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// A workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    #[serde(default)]
    pub id: WorkflowId,
    /// Workflow metadata.
    pub metadata: WorkflowMetadata,
    /// The graph runs execute.
    pub graph: GraphDefinition,
}

impl Workflow {
    /// Creates a workflow with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, graph: GraphDefinition) -> Self {
        Self::with_id(WorkflowId::new(), name, graph)
    }

    /// Creates a workflow with a specific id.
    #[must_use]
    pub fn with_id(id: WorkflowId, name: impl Into<String>, graph: GraphDefinition) -> Self {
        Self {
            id,
            metadata: WorkflowMetadata::new(name),
            graph,
        }
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Summary information about a workflow (for listings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Workflow ID.
    pub id: WorkflowId,
    /// Workflow name.
    pub name: String,
    /// Description, if any.
    pub description: Option<String>,
    /// Number of nodes in the graph.
    pub node_count: usize,
    /// Number of edges in the graph.
    pub edge_count: usize,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id,
            name: workflow.metadata.name.clone(),
            description: workflow.metadata.description.clone(),
            node_count: workflow.graph.nodes.len(),
            edge_count: workflow.graph.edges.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::Node;

    fn two_step_graph() -> GraphDefinition {
        GraphDefinition::new()
            .with_node(Node::trigger("A"))
            .with_node(Node::new("B", "telegram").configured())
            .with_edge(Edge::new("e1", "A", "B"))
    }

    #[test]
    fn workflow_metadata_builder() {
        let metadata = WorkflowMetadata::new("Daily digest")
            .with_description("Sends a summary")
            .with_tag("daily");

        assert_eq!(metadata.name, "Daily digest");
        assert_eq!(metadata.description.as_deref(), Some("Sends a summary"));
        assert_eq!(metadata.tags, vec!["daily"]);
    }

    #[test]
    fn workflow_summary_counts_graph() {
        let workflow = Workflow::new("Notify", two_step_graph());
        let summary = WorkflowSummary::from(&workflow);

        assert_eq!(summary.id, workflow.id);
        assert_eq!(summary.name, "Notify");
        assert_eq!(summary.node_count, 2);
        assert_eq!(summary.edge_count, 1);
    }

    #[test]
    fn workflow_without_id_gets_one() {
        let workflow: Workflow = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "Loaded"},
            "graph": {"nodes": [{"id": "A", "kind": "trigger"}]}
        }))
        .expect("deserialize");

        assert_eq!(workflow.name(), "Loaded");
        assert!(workflow.id.to_string().starts_with("wf_"));
    }
}
