//! This module contains the flattened tables of an automaton.
//!
//! [`AutomatonTables`] is a plain dump of the graph: the transitions of all nodes in one vector
//! and per node the range of its entries. [`FastTransitions`] is built for matching a DFA: each
//! state gets a direct lookup, indexed by the input byte or by the live conditional flags.

use crate::{
    automaton::Automaton,
    conditional::CONDITIONAL_FLAG_COMBINATIONS,
    graph::TransitionKind,
};

/// A transition in the flat table: kind code, the two data words and the target node.
pub type TableTransition = (u32, u32, u32, u32);

/// The accept handler entry of nodes that don't accept.
pub const NO_HANDLER: u32 = u32::MAX;

/// The flat transition tables of an automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatonTables {
    /// Each entry represents a node: the offset of its first transition in `transitions` and
    /// the number of its transitions.
    pub state_ranges: Vec<(usize, usize)>,
    /// The transitions of all nodes in canonical order.
    pub transitions: Vec<TableTransition>,
    /// The accept handler of each node. Nodes that don't accept hold [`NO_HANDLER`].
    pub accept_handlers: Vec<u32>,
    /// The start node of each scanner mode.
    pub start_states: Vec<u32>,
}

impl AutomatonTables {
    /// Create the tables of the automaton.
    pub fn new(automaton: &Automaton) -> Self {
        let mut state_ranges = Vec::with_capacity(automaton.node_count());
        let mut transitions = Vec::with_capacity(automaton.graph().transition_count());
        let mut accept_handlers = Vec::with_capacity(automaton.node_count());
        for (index, node) in automaton.graph().nodes() {
            state_ranges.push((transitions.len(), node.transition_count()));
            transitions.extend(node.transitions().map(|t| {
                let [data0, data1] = t.data();
                (t.kind().code(), data0, data1, t.target().as_u32())
            }));
            accept_handlers.push(
                automaton
                    .accept_handler(index)
                    .map_or(NO_HANDLER, |h| h.as_u32()),
            );
        }
        AutomatonTables {
            state_ranges,
            transitions,
            accept_handlers,
            start_states: automaton
                .start_state_index()
                .iter()
                .map(|s| s.as_u32())
                .collect(),
        }
    }
}

/// The lookup of a single DFA state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastState {
    /// A state that consumes input. The bytes `first_byte..first_byte + count` are looked up at
    /// `offset + byte - first_byte`, all other bytes have no transition.
    Input {
        /// The smallest byte with a transition.
        first_byte: u8,
        /// The size of the window.
        count: usize,
        /// The start of the window in the lookup.
        offset: usize,
    },
    /// A state that branches on the live conditional flags. The flags are looked up at
    /// `offset + flags`.
    Conditional {
        /// The start of the 32 entries in the lookup.
        offset: usize,
    },
}

/// The direct lookup tables of a DFA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastTransitions {
    pub(crate) states: Vec<FastState>,
    pub(crate) lookup: Vec<u32>,
    pub(crate) accept_handlers: Vec<u32>,
    pub(crate) start_states: Vec<u32>,
}

impl FastTransitions {
    /// Create the lookup tables of a DFA.
    ///
    /// # Panics
    /// Panics if two conditional transitions of a state accept the same flags, i.e. if the
    /// automaton isn't deterministic.
    pub fn new(dfa: &Automaton) -> Self {
        let tables = AutomatonTables::new(dfa);
        let sentinel = dfa.node_count() as u32;
        let mut states = Vec::with_capacity(dfa.node_count());
        let mut lookup = Vec::new();
        for (index, node) in dfa.graph().nodes() {
            let offset = lookup.len();
            if node.has_conditional_transitions() {
                lookup.resize(offset + CONDITIONAL_FLAG_COMBINATIONS, sentinel);
                for transition in node.transitions() {
                    let Some(conditional) = transition.conditional_data() else {
                        continue;
                    };
                    for flags in 0..CONDITIONAL_FLAG_COMBINATIONS {
                        if conditional.accepts(flags as u8) {
                            let entry = &mut lookup[offset + flags];
                            assert_eq!(
                                *entry, sentinel,
                                "state {index} has overlapping conditional transitions"
                            );
                            *entry = transition.target().as_u32();
                        }
                    }
                }
                states.push(FastState::Conditional { offset });
                continue;
            }

            let ranges = node
                .transitions()
                .filter_map(|t| t.byte_range().map(|r| (r, t.target())))
                .collect::<Vec<_>>();
            let first_byte = ranges.iter().map(|((first, _), _)| *first).min();
            let last_byte = ranges.iter().map(|((_, last), _)| *last).max();
            let (first_byte, count) = match (first_byte, last_byte) {
                (Some(first), Some(last)) => (first, (last - first) as usize + 1),
                _ => (0, 0),
            };
            lookup.resize(offset + count, sentinel);
            for ((first, last), target) in ranges {
                for byte in first..=last {
                    lookup[offset + (byte - first_byte) as usize] = target.as_u32();
                }
            }
            debug_assert!(node
                .transitions()
                .all(|t| t.kind() != TransitionKind::Epsilon));
            states.push(FastState::Input {
                first_byte,
                count,
                offset,
            });
        }
        FastTransitions {
            states,
            lookup,
            accept_handlers: tables.accept_handlers,
            start_states: tables.start_states,
        }
    }

    /// The lookup entry of missing transitions: the number of states.
    #[inline]
    pub fn sentinel(&self) -> u32 {
        self.states.len() as u32
    }

    /// Get the lookup of a state.
    pub fn state(&self, state: usize) -> FastState {
        self.states[state]
    }

    /// Get the start state of a scanner mode.
    pub fn start_state(&self, mode: usize) -> Option<usize> {
        self.start_states.get(mode).map(|s| *s as usize)
    }

    /// Get the accept handler of a state, if it accepts.
    #[inline]
    pub fn accept_handler(&self, state: usize) -> Option<u32> {
        let handler = self.accept_handlers[state];
        (handler != NO_HANDLER).then_some(handler)
    }

    /// Get the state reached from an input state by the byte.
    #[inline]
    pub fn next_on_byte(&self, state: usize, byte: u8) -> Option<usize> {
        match self.states[state] {
            FastState::Input {
                first_byte,
                count,
                offset,
            } => {
                let index = byte.checked_sub(first_byte)? as usize;
                if index >= count {
                    return None;
                }
                let target = self.lookup[offset + index];
                (target != self.sentinel()).then_some(target as usize)
            }
            FastState::Conditional { .. } => None,
        }
    }

    /// Get the state reached from a conditional state under the live flags.
    #[inline]
    pub fn next_on_flags(&self, state: usize, flags: u8) -> Option<usize> {
        match self.states[state] {
            FastState::Conditional { offset } => {
                let target = self.lookup[offset + flags as usize];
                (target != self.sentinel()).then_some(target as usize)
            }
            FastState::Input { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compiler::compile, rule_set::RuleSet};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn compile_rules(rules: &[&str]) -> Automaton {
        let mut rule_set = RuleSet::new();
        let mode = rule_set.add_mode("INITIAL");
        for rule in rules {
            mode.add_rule(*rule);
        }
        compile(&rule_set).unwrap().dfa().clone()
    }

    #[test]
    fn test_automaton_tables() {
        init();
        let dfa = compile_rules(&["ab", "[0-9]"]);
        let tables = AutomatonTables::new(&dfa);
        assert_eq!(tables.state_ranges.len(), dfa.node_count());
        assert_eq!(tables.transitions.len(), dfa.graph().transition_count());
        assert_eq!(tables.start_states, vec![0]);
        let (offset, count) = tables.state_ranges[0];
        assert_eq!((offset, count), (0, 2));
        // Single bytes sort before ranges
        assert_eq!(tables.transitions[0].0, TransitionKind::InputAtom.code());
        assert_eq!(tables.transitions[0].1, b'a' as u32);
        assert_eq!(tables.transitions[1].0, TransitionKind::InputAtomRange.code());
        assert_eq!(tables.transitions[1].1, b'0' as u32);
        assert_eq!(tables.transitions[1].2, b'9' as u32);
        assert_eq!(tables.accept_handlers[0], NO_HANDLER);
        let accepting = tables
            .accept_handlers
            .iter()
            .filter(|h| **h != NO_HANDLER)
            .count();
        assert_eq!(accepting, 2);
    }

    #[test]
    fn test_handler_beyond_node_count() {
        init();
        // Three DFA states, the last rule has handler 3
        let dfa = compile_rules(&["a", "a", "a", "b"]);
        assert_eq!(dfa.node_count(), 3);
        let fast = FastTransitions::new(&dfa);
        let start = fast.start_state(0).unwrap();
        let after_b = fast.next_on_byte(start, b'b').unwrap();
        assert_eq!(fast.accept_handler(after_b), Some(3));
        assert_eq!(fast.accept_handler(start), None);
    }

    #[test]
    fn test_fast_transitions_window() {
        init();
        let dfa = compile_rules(&["[b-d]x|z"]);
        let fast = FastTransitions::new(&dfa);
        let start = fast.start_state(0).unwrap();
        assert_eq!(
            fast.state(start),
            FastState::Input {
                first_byte: b'b',
                count: 25,
                offset: 0
            }
        );
        assert!(fast.next_on_byte(start, b'a').is_none());
        assert!(fast.next_on_byte(start, b'e').is_none());
        let after_c = fast.next_on_byte(start, b'c').unwrap();
        assert_eq!(
            fast.next_on_byte(start, b'z').map(|s| fast.accept_handler(s)),
            Some(Some(0))
        );
        assert!(fast.accept_handler(after_c).is_none());
        assert!(fast.start_state(1).is_none());
    }

    #[test]
    fn test_fast_transitions_conditional() {
        init();
        let dfa = compile_rules(&["^a"]);
        let fast = FastTransitions::new(&dfa);
        let start = fast.start_state(0).unwrap();
        assert!(matches!(fast.state(start), FastState::Conditional { .. }));
        let at_line_start = fast.next_on_flags(start, crate::conditional::BEGINNING_OF_LINE);
        assert!(at_line_start.is_some());
        assert!(fast.next_on_flags(start, 0).is_none());
        assert!(fast.next_on_byte(start, b'a').is_none());
    }
}
