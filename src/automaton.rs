//! This module contains the automaton type shared by the NFA and the DFA.

use crate::{graph::Graph, HandlerID, NodeID};

/// The payload of an automaton node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeData {
    /// The node is the start state of a scanner mode.
    pub is_start: bool,
    /// The node accepts.
    pub is_accept: bool,
    /// A descriptive label, used for debug output.
    pub label: String,
    /// The handler of the accepting rule. Only meaningful if `is_accept` is set.
    pub accept_handler_index: HandlerID,
}

impl NodeData {
    /// Payload of a plain intermediate node.
    pub fn intermediate() -> Self {
        NodeData::default()
    }

    /// Payload of a scanner mode's start node.
    pub fn start(label: impl Into<String>) -> Self {
        NodeData {
            is_start: true,
            label: label.into(),
            ..Default::default()
        }
    }

    /// Payload of the accept node of a rule.
    pub fn accept(handler: HandlerID, label: impl Into<String>) -> Self {
        NodeData {
            is_accept: true,
            label: label.into(),
            accept_handler_index: handler,
            ..Default::default()
        }
    }
}

/// A finite automaton: a graph plus one start state per scanner mode.
#[derive(Debug, Clone, Default)]
pub struct Automaton {
    graph: Graph<NodeData>,
    start_state_index: Vec<NodeID>,
}

impl Automaton {
    /// Create an automaton from its parts.
    pub fn new(graph: Graph<NodeData>, start_state_index: Vec<NodeID>) -> Self {
        Automaton {
            graph,
            start_state_index,
        }
    }

    /// Get the graph.
    pub fn graph(&self) -> &Graph<NodeData> {
        &self.graph
    }

    /// Get the start states, one per scanner mode, in mode order.
    pub fn start_state_index(&self) -> &[NodeID] {
        &self.start_state_index
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns true if the node is an accept node.
    pub fn is_accept(&self, node: NodeID) -> bool {
        self.graph.node_data(node).is_some_and(|d| d.is_accept)
    }

    /// Get the accept handler of a node if it accepts.
    pub fn accept_handler(&self, node: NodeID) -> Option<HandlerID> {
        self.graph
            .node_data(node)
            .filter(|d| d.is_accept)
            .map(|d| d.accept_handler_index)
    }

    /// Iterate over the accepting nodes and their handlers.
    pub fn accepting_nodes(&self) -> impl Iterator<Item = (NodeID, HandlerID)> + '_ {
        self.graph
            .nodes()
            .filter_map(|(index, _)| self.accept_handler(index).map(|h| (index, h)))
    }
}
