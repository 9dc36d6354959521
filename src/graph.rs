//! This module contains the graph arena both automata are built in.
//! Nodes are appended and never removed, so a `NodeID` stays valid for the whole construction.

use std::collections::BTreeSet;

use crate::{conditional::Conditional, transition_codec, NodeID};

/// The kind of a transition. The declaration order is the canonical order of transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransitionKind {
    /// Consumes the single byte `data[0]`.
    InputAtom,
    /// Consumes any byte in `data[0]..=data[1]`.
    InputAtomRange,
    /// Consumes no input, taken if the conditional `mask = data[0], flags = data[1]` holds.
    Conditional,
    /// Consumes no input, always taken.
    Epsilon,
}

impl TransitionKind {
    /// The numeric code used in the emitted tables.
    pub fn code(self) -> u32 {
        match self {
            TransitionKind::InputAtom => 0,
            TransitionKind::InputAtomRange => 1,
            TransitionKind::Conditional => 2,
            TransitionKind::Epsilon => 3,
        }
    }
}

/// A transition to a target node.
/// Equality and ordering only regard kind, data and target; label and color are decoration.
#[derive(Debug, Clone)]
pub struct Transition {
    kind: TransitionKind,
    data: [u32; 2],
    target: NodeID,
    label: String,
    color: u32,
}

impl Transition {
    fn new(kind: TransitionKind, data: [u32; 2], target: NodeID) -> Self {
        Transition {
            kind,
            data,
            target,
            label: transition_codec::transition_label(kind, data),
            color: transition_codec::transition_color(kind),
        }
    }

    /// Create an epsilon transition.
    pub fn epsilon(target: NodeID) -> Self {
        Transition::new(TransitionKind::Epsilon, [0, 0], target)
    }

    /// Create a conditional transition.
    pub fn conditional(conditional: Conditional, target: NodeID) -> Self {
        Transition::new(
            TransitionKind::Conditional,
            [conditional.mask() as u32, conditional.flags() as u32],
            target,
        )
    }

    /// Create a transition on a single byte.
    pub fn input_atom(byte: u8, target: NodeID) -> Self {
        Transition::new(TransitionKind::InputAtom, [byte as u32, 0], target)
    }

    /// Create a transition on an inclusive byte range.
    pub fn input_atom_range(first: u8, last: u8, target: NodeID) -> Self {
        debug_assert!(first < last, "degenerated range {first}..={last}");
        Transition::new(
            TransitionKind::InputAtomRange,
            [first as u32, last as u32],
            target,
        )
    }

    /// Get the kind of the transition.
    #[inline]
    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    /// Get the raw data words of the transition.
    #[inline]
    pub fn data(&self) -> [u32; 2] {
        self.data
    }

    /// Get the target node.
    #[inline]
    pub fn target(&self) -> NodeID {
        self.target
    }

    /// Get the label of the transition.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the color of the transition (0xRRGGBB).
    pub fn color(&self) -> u32 {
        self.color
    }

    /// Returns true for transitions that consume no input.
    #[inline]
    pub fn is_zero_width(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Epsilon | TransitionKind::Conditional
        )
    }

    /// The inclusive byte range consumed by an input transition.
    pub fn byte_range(&self) -> Option<(u8, u8)> {
        match self.kind {
            TransitionKind::InputAtom => Some((self.data[0] as u8, self.data[0] as u8)),
            TransitionKind::InputAtomRange => Some((self.data[0] as u8, self.data[1] as u8)),
            _ => None,
        }
    }

    /// The conditional of a conditional transition.
    pub fn conditional_data(&self) -> Option<Conditional> {
        match self.kind {
            TransitionKind::Conditional => {
                Some(Conditional::new(self.data[0] as u8, self.data[1] as u8))
            }
            _ => None,
        }
    }

    fn sort_key(&self) -> (TransitionKind, [u32; 2], NodeID) {
        (self.kind, self.data, self.target)
    }
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Transition {}

impl PartialOrd for Transition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Transition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A node of the graph with an optional payload.
#[derive(Debug, Clone)]
pub struct Node<D> {
    data: Option<D>,
    transitions: BTreeSet<Transition>,
}

impl<D> Node<D> {
    /// Get the payload of the node.
    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    /// Iterate over the outgoing transitions in canonical order.
    pub fn transitions(&self) -> impl ExactSizeIterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Get the number of outgoing transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Returns true if the node has at least one transition that consumes input.
    pub fn has_input_transitions(&self) -> bool {
        self.transitions.iter().any(|t| !t.is_zero_width())
    }

    /// Returns true if the node has at least one conditional transition.
    pub fn has_conditional_transitions(&self) -> bool {
        self.transitions
            .iter()
            .any(|t| t.kind() == TransitionKind::Conditional)
    }
}

/// An append-only directed multigraph.
#[derive(Debug, Clone)]
pub struct Graph<D> {
    nodes: Vec<Node<D>>,
}

impl<D> Default for Graph<D> {
    fn default() -> Self {
        Graph { nodes: Vec::new() }
    }
}

impl<D> Graph<D> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Graph::default()
    }

    /// Append a node and return its index.
    pub fn add_node(&mut self, data: Option<D>) -> NodeID {
        let index = NodeID::new(self.nodes.len());
        self.nodes.push(Node {
            data,
            transitions: BTreeSet::new(),
        });
        index
    }

    /// Add a transition to the source node.
    ///
    /// # Panics
    /// Panics if an equal transition already exists at the source node or if one of the nodes
    /// doesn't exist.
    pub fn add_transition(&mut self, source: NodeID, transition: Transition) {
        assert!(
            transition.target().as_usize() < self.nodes.len(),
            "transition target {} doesn't exist",
            transition.target()
        );
        let label = transition.label().to_string();
        let target = transition.target();
        if !self.nodes[source].transitions.insert(transition) {
            panic!("transition {source} -> {target} ({label}) added twice");
        }
    }

    /// Returns true if an equal transition already exists at the source node.
    pub fn has_transition(&self, source: NodeID, transition: &Transition) -> bool {
        self.nodes[source].transitions.contains(transition)
    }

    /// Get a node.
    #[inline]
    pub fn node(&self, index: NodeID) -> &Node<D> {
        &self.nodes[index]
    }

    /// Get the payload of a node.
    #[inline]
    pub fn node_data(&self, index: NodeID) -> Option<&D> {
        self.nodes[index].data.as_ref()
    }

    /// Get the number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of transitions of all nodes.
    pub fn transition_count(&self) -> usize {
        self.nodes.iter().map(|n| n.transitions.len()).sum()
    }

    /// Iterate over all nodes together with their indices.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeID, &Node<D>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeID::new(i), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditional::{conditional_from_type, ConditionalType};

    #[test]
    fn test_add_node() {
        let mut graph: Graph<&str> = Graph::new();
        let n0 = graph.add_node(Some("first"));
        let n1 = graph.add_node(None);
        assert_eq!(n0.as_usize(), 0);
        assert_eq!(n1.as_usize(), 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node_data(n0), Some(&"first"));
        assert_eq!(graph.node_data(n1), None);
    }

    #[test]
    fn test_canonical_transition_order() {
        let mut graph: Graph<()> = Graph::new();
        let n0 = graph.add_node(None);
        let n1 = graph.add_node(None);
        let n2 = graph.add_node(None);
        graph.add_transition(n0, Transition::epsilon(n2));
        graph.add_transition(
            n0,
            Transition::conditional(conditional_from_type(ConditionalType::EndOfLine), n1),
        );
        graph.add_transition(n0, Transition::input_atom(b'b', n1));
        graph.add_transition(n0, Transition::input_atom_range(b'0', b'9', n2));
        graph.add_transition(n0, Transition::input_atom(b'a', n2));
        graph.add_transition(n0, Transition::input_atom(b'a', n1));

        let order: Vec<(TransitionKind, [u32; 2], usize)> = graph
            .node(n0)
            .transitions()
            .map(|t| (t.kind(), t.data(), t.target().as_usize()))
            .collect();
        assert_eq!(
            order,
            vec![
                (TransitionKind::InputAtom, [b'a' as u32, 0], 1),
                (TransitionKind::InputAtom, [b'a' as u32, 0], 2),
                (TransitionKind::InputAtom, [b'b' as u32, 0], 1),
                (TransitionKind::InputAtomRange, [b'0' as u32, b'9' as u32], 2),
                (TransitionKind::Conditional, [8, 8], 1),
                (TransitionKind::Epsilon, [0, 0], 2),
            ]
        );
        assert_eq!(graph.transition_count(), 6);
    }

    #[test]
    fn test_has_transition() {
        let mut graph: Graph<()> = Graph::new();
        let n0 = graph.add_node(None);
        let n1 = graph.add_node(None);
        graph.add_transition(n0, Transition::input_atom(b'x', n0));
        assert!(graph.has_transition(n0, &Transition::input_atom(b'x', n0)));
        assert!(!graph.has_transition(n0, &Transition::input_atom(b'x', n1)));
        assert!(!graph.has_transition(n0, &Transition::input_atom(b'y', n0)));
        assert!(!graph.has_transition(n1, &Transition::input_atom(b'x', n0)));
    }

    #[test]
    #[should_panic(expected = "added twice")]
    fn test_duplicate_transition_panics() {
        let mut graph: Graph<()> = Graph::new();
        let n0 = graph.add_node(None);
        let n1 = graph.add_node(None);
        graph.add_transition(n0, Transition::epsilon(n1));
        graph.add_transition(n0, Transition::epsilon(n1));
    }
}
