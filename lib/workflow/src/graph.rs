//! Workflow graph implementation using petgraph.
//!
//! A graph is built from a [`GraphDefinition`] once per run and never
//! mutated afterwards. Construction validates it, so a `WorkflowGraph` always
//! has at least one node, unique node ids and no dangling edges. Cycles are
//! allowed; the traversal engine bounds them.

use crate::edge::{Edge, EdgeKind};
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized form of a graph: ordered nodes and edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Nodes in definition order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges in definition order.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds an edge.
    #[must_use]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}

/// A validated workflow graph using petgraph's directed graph.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    graph: DiGraph<Node, EdgeKind>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Builds and validates a graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition has no nodes, repeats a node id,
    /// or has an edge whose source or target is unknown.
    pub fn from_definition(definition: &GraphDefinition) -> Result<Self, GraphError> {
        if definition.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let mut graph = DiGraph::with_capacity(definition.nodes.len(), definition.edges.len());
        let mut node_index_map = HashMap::with_capacity(definition.nodes.len());

        for node in &definition.nodes {
            if node_index_map.contains_key(&node.id) {
                return Err(GraphError::DuplicateNode {
                    node_id: node.id.clone(),
                });
            }
            let id = node.id.clone();
            let index = graph.add_node(node.clone());
            node_index_map.insert(id, index);
        }

        for edge in &definition.edges {
            let lookup = |node_id: &NodeId| {
                node_index_map
                    .get(node_id)
                    .copied()
                    .ok_or_else(|| GraphError::DanglingEdge {
                        edge_id: edge.id.clone(),
                        node_id: node_id.clone(),
                    })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;
            graph.add_edge(source, target, edge.kind);
        }

        Ok(Self {
            graph,
            node_index_map,
        })
    }

    /// Returns a node by its id.
    #[must_use]
    pub fn get_node(&self, node_id: &NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes in definition order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Computes the traversal entry points.
    ///
    /// A single node is always the sole start node. Otherwise a node starts a
    /// traversal if no edge of any kind targets it, or if it is a trigger.
    /// When nothing qualifies the first node in definition order is used.
    #[must_use]
    pub fn start_nodes(&self) -> StartNodes<'_> {
        let all: Vec<NodeIndex> = self.graph.node_indices().collect();
        if all.len() == 1 {
            return StartNodes {
                graph: self,
                indices: all,
                used_fallback: false,
            };
        }

        let mut has_incoming = vec![false; all.len()];
        for edge in self.graph.edge_references() {
            has_incoming[edge.target().index()] = true;
        }

        let indices: Vec<NodeIndex> = all
            .iter()
            .copied()
            .filter(|&idx| !has_incoming[idx.index()] || self.graph[idx].kind.is_trigger())
            .collect();

        if indices.is_empty() {
            return StartNodes {
                graph: self,
                indices: all.into_iter().take(1).collect(),
                used_fallback: true,
            };
        }

        StartNodes {
            graph: self,
            indices,
            used_fallback: false,
        }
    }

    /// Builds the outgoing adjacency index in edge definition order.
    #[must_use]
    pub(crate) fn adjacency(&self) -> Adjacency {
        let mut outgoing = vec![Vec::new(); self.graph.node_count()];
        for edge in self.graph.edge_references() {
            outgoing[edge.source().index()].push((*edge.weight(), edge.target()));
        }
        Adjacency { outgoing }
    }

    /// Returns the node at an index produced by this graph.
    pub(crate) fn node_at(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }
}

/// The non-empty set of traversal entry points.
#[derive(Debug, Clone)]
pub struct StartNodes<'g> {
    graph: &'g WorkflowGraph,
    indices: Vec<NodeIndex>,
    used_fallback: bool,
}

impl<'g> StartNodes<'g> {
    /// The start nodes in definition order.
    pub fn nodes(&self) -> impl Iterator<Item = &'g Node> + '_ {
        self.indices.iter().map(|&idx| self.graph.node_at(idx))
    }

    /// The start node ids in definition order.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes().map(|node| node.id.clone()).collect()
    }

    /// Number of start nodes. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns false; a resolved set is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// True when no node qualified and the first node was used instead.
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    pub(crate) fn indices(&self) -> &[NodeIndex] {
        &self.indices
    }
}

/// Outgoing edges per node, in edge definition order.
#[derive(Debug, Clone)]
pub(crate) struct Adjacency {
    outgoing: Vec<Vec<(EdgeKind, NodeIndex)>>,
}

impl Adjacency {
    /// Targets of the node's outgoing edges of one kind.
    pub(crate) fn targets(&self, node: NodeIndex, kind: EdgeKind) -> Vec<NodeIndex> {
        self.outgoing
            .get(node.index())
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(edge_kind, _)| *edge_kind == kind)
                    .map(|&(_, target)| target)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(definition: GraphDefinition) -> WorkflowGraph {
        WorkflowGraph::from_definition(&definition).expect("valid graph")
    }

    #[test]
    fn empty_definition_is_rejected() {
        let err = WorkflowGraph::from_definition(&GraphDefinition::new()).unwrap_err();
        assert_eq!(err, GraphError::EmptyGraph);
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let definition = GraphDefinition::new()
            .with_node(Node::trigger("A"))
            .with_node(Node::new("A", "slack"));
        let err = WorkflowGraph::from_definition(&definition).unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateNode {
                node_id: NodeId::new("A")
            }
        );
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let definition = GraphDefinition::new()
            .with_node(Node::trigger("A"))
            .with_edge(Edge::new("e1", "A", "missing"));
        let err = WorkflowGraph::from_definition(&definition).unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingEdge {
                edge_id: "e1".to_string(),
                node_id: NodeId::new("missing"),
            }
        );
    }

    #[test]
    fn single_node_is_start_regardless_of_kind() {
        let graph = build(GraphDefinition::new().with_node(Node::new("only", "mysql")));
        let start = graph.start_nodes();
        assert_eq!(start.ids(), vec![NodeId::new("only")]);
        assert!(!start.used_fallback());
    }

    #[test]
    fn single_self_looping_node_is_start() {
        let graph = build(
            GraphDefinition::new()
                .with_node(Node::new("loop", "slack"))
                .with_edge(Edge::new("e1", "loop", "loop")),
        );
        assert_eq!(graph.start_nodes().ids(), vec![NodeId::new("loop")]);
    }

    #[test]
    fn node_with_incoming_edge_is_not_start() {
        let graph = build(
            GraphDefinition::new()
                .with_node(Node::trigger("A"))
                .with_node(Node::new("B", "telegram"))
                .with_edge(Edge::new("e1", "A", "B")),
        );
        assert_eq!(graph.start_nodes().ids(), vec![NodeId::new("A")]);
    }

    #[test]
    fn error_handler_edges_count_as_incoming() {
        let graph = build(
            GraphDefinition::new()
                .with_node(Node::new("D", "webhook"))
                .with_node(Node::new("F", "slack"))
                .with_edge(Edge::error_handler("e1", "D", "F")),
        );
        assert_eq!(graph.start_nodes().ids(), vec![NodeId::new("D")]);
    }

    #[test]
    fn trigger_with_incoming_edge_is_still_start() {
        let graph = build(
            GraphDefinition::new()
                .with_node(Node::new("X", "slack"))
                .with_node(Node::trigger("T"))
                .with_edge(Edge::new("e1", "X", "T")),
        );
        assert_eq!(
            graph.start_nodes().ids(),
            vec![NodeId::new("X"), NodeId::new("T")]
        );
    }

    #[test]
    fn cycle_without_trigger_falls_back_to_first_node() {
        let graph = build(
            GraphDefinition::new()
                .with_node(Node::new("P", "slack"))
                .with_node(Node::new("Q", "gmail"))
                .with_edge(Edge::new("e1", "P", "Q"))
                .with_edge(Edge::new("e2", "Q", "P")),
        );
        let start = graph.start_nodes();
        assert_eq!(start.ids(), vec![NodeId::new("P")]);
        assert!(start.used_fallback());
        assert_eq!(start.len(), 1);
    }

    #[test]
    fn adjacency_keeps_definition_order_and_splits_kinds() {
        let graph = build(
            GraphDefinition::new()
                .with_node(Node::trigger("A"))
                .with_node(Node::new("B", "slack"))
                .with_node(Node::new("C", "slack"))
                .with_node(Node::new("H", "slack"))
                .with_edge(Edge::new("e1", "A", "B"))
                .with_edge(Edge::error_handler("e2", "A", "H"))
                .with_edge(Edge::new("e3", "A", "C")),
        );
        let adjacency = graph.adjacency();
        let a = graph.start_nodes().indices()[0];

        let normal: Vec<&str> = adjacency
            .targets(a, EdgeKind::Normal)
            .into_iter()
            .map(|idx| graph.node_at(idx).id.as_str())
            .collect();
        let handlers: Vec<&str> = adjacency
            .targets(a, EdgeKind::ErrorHandler)
            .into_iter()
            .map(|idx| graph.node_at(idx).id.as_str())
            .collect();

        assert_eq!(normal, vec!["B", "C"]);
        assert_eq!(handlers, vec!["H"]);
    }

    #[test]
    fn definition_deserializes_from_json() {
        let definition: GraphDefinition = serde_json::from_str(
            r#"{
                "nodes": [
                    {"id": "A", "kind": "trigger"},
                    {"id": "B", "kind": "telegram", "configuredFlag": true}
                ],
                "edges": [{"id": "e1", "source": "A", "target": "B"}]
            }"#,
        )
        .expect("deserialize");
        let graph = build(definition);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.get_node(&NodeId::new("B")).is_some());
    }
}
