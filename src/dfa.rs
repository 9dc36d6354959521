//! This module contains the subset construction of the DFA.
//! The DFA is generated from the NFA. Zero-width conditionals are resolved on the way: a DFA state
//! either consumes input or branches on the live conditional flags, never both.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    time::Instant,
};

use itertools::Itertools;
use log::{debug, trace};

use crate::{
    automaton::{Automaton, NodeData},
    conditional::Conditional,
    graph::{Graph, Transition, TransitionKind},
    NodeID, Result,
};

/// A DFA state: the ordered set of NFA nodes it consists of.
pub type DfaState = BTreeSet<NodeID>;

// The nodes that are reachable over zero-width transitions, grouped by the composed conditional
// of the path.
type TargetStateMap = BTreeMap<Conditional, DfaState>;

// A DFA state that is the target of a conditional branch has its conditionals already decided
// and is therefore kept apart from the same node set reached by input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct DfaStateKey {
    nodes: DfaState,
    conditional_target: bool,
}

/// Generate the DFA of the NFA.
/// The DFA gets one start state per start state of the NFA, in the same order.
/// # Arguments
/// * `nfa` - The NFA.
/// * `nfa_accept_state_count` - The number of accept nodes. They are the first nodes of the NFA and
///   the node index is the handler index.
/// # Errors
/// Returns `ConflictingConditional` if conditionals on a zero-width path can't hold together.
pub fn generate_dfa(nfa: &Automaton, nfa_accept_state_count: usize) -> Result<Automaton> {
    let now = Instant::now();
    let mut builder = DfaBuilder {
        nfa,
        nfa_accept_state_count,
        graph: Graph::new(),
        state_map: BTreeMap::new(),
        states: Vec::new(),
        work_list: Vec::new(),
    };
    let start_states = nfa
        .start_state_index()
        .iter()
        .map(|start| builder.dfa_state_index(DfaState::from([*start]), false))
        .collect::<Vec<_>>();

    while let Some(state) = builder.work_list.pop() {
        builder.explore(state)?;
    }

    debug!(
        "DFA with {} states and {} transitions generated in {} milliseconds.",
        builder.graph.node_count(),
        builder.graph.transition_count(),
        now.elapsed().as_millis()
    );
    Ok(Automaton::new(builder.graph, start_states))
}

struct DfaBuilder<'a> {
    nfa: &'a Automaton,
    nfa_accept_state_count: usize,
    graph: Graph<NodeData>,
    state_map: BTreeMap<DfaStateKey, NodeID>,
    // The key of each DFA node, indexed by the node.
    states: Vec<DfaStateKey>,
    work_list: Vec<NodeID>,
}

impl DfaBuilder<'_> {
    /// Follow the epsilon transitions. Only the nodes that matter for the DFA are kept: start and
    /// accept nodes and nodes with input or conditional transitions.
    fn epsilon_closure(&self, seeds: DfaState) -> DfaState {
        let nfa = self.nfa;
        let graph = nfa.graph();
        let mut closure = DfaState::new();
        let mut visited: HashSet<NodeID> = seeds.iter().copied().collect();
        let mut stack: Vec<NodeID> = seeds.into_iter().collect();
        while let Some(node_id) = stack.pop() {
            let node = graph.node(node_id);
            let data = node.data();
            if data.is_some_and(|d| d.is_start || d.is_accept)
                || node.transitions().any(|t| t.kind() != TransitionKind::Epsilon)
            {
                closure.insert(node_id);
            }
            for transition in node.transitions() {
                if transition.kind() == TransitionKind::Epsilon
                    && visited.insert(transition.target())
                {
                    stack.push(transition.target());
                }
            }
        }
        closure
    }

    /// Get the DFA node of the closure of the seeds, create it if it doesn't exist yet.
    /// New nodes are registered before they are explored and queued on the work list.
    fn dfa_state_index(&mut self, seeds: DfaState, conditional_target: bool) -> NodeID {
        let key = DfaStateKey {
            nodes: self.epsilon_closure(seeds),
            conditional_target,
        };
        if let Some(index) = self.state_map.get(&key) {
            return *index;
        }

        let nfa = self.nfa;
        let graph = nfa.graph();
        let mut data = NodeData {
            label: key
                .nodes
                .iter()
                .filter_map(|n| graph.node_data(*n))
                .map(|d| d.label.as_str())
                .filter(|l| !l.is_empty())
                .join(", "),
            ..Default::default()
        };
        for node in key.nodes.iter().filter_map(|n| graph.node_data(*n)) {
            data.is_start |= node.is_start;
            data.is_accept |= node.is_accept;
        }
        if let Some(handler) = key
            .nodes
            .iter()
            .filter_map(|n| nfa.accept_handler(*n))
            .min()
        {
            assert!(
                handler.as_usize() < self.nfa_accept_state_count,
                "accept handler {handler} out of range"
            );
            data.accept_handler_index = handler;
        }

        let index = self.graph.add_node(Some(data));
        trace!(
            "New DFA state {index} {:?} (conditional target: {conditional_target})",
            key.nodes.iter().map(|n| n.as_usize()).collect::<Vec<_>>()
        );
        self.state_map.insert(key.clone(), index);
        self.states.push(key);
        self.work_list.push(index);
        index
    }

    /// Follow epsilon and conditional transitions from every member and collect the nodes that
    /// consume input or accept, keyed by the composed conditional of their path.
    fn transition_closure(&self, members: &DfaState) -> Result<TargetStateMap> {
        let graph = self.nfa.graph();
        let mut targets = TargetStateMap::new();
        let mut visited: HashSet<(NodeID, Conditional)> = HashSet::new();
        let mut stack: Vec<(NodeID, Conditional)> = Vec::new();
        for member in members {
            if visited.insert((*member, Conditional::EMPTY)) {
                stack.push((*member, Conditional::EMPTY));
            }
        }
        while let Some((node_id, conditional)) = stack.pop() {
            let node = graph.node(node_id);
            let is_start = node.data().is_some_and(|d| d.is_start);
            let is_accept = node.data().is_some_and(|d| d.is_accept);
            if !is_start {
                assert_eq!(
                    node.transition_count() == 0,
                    is_accept,
                    "NFA node {node_id} must have no transitions exactly if it accepts"
                );
            }
            if is_accept || node.has_input_transitions() {
                targets.entry(conditional).or_default().insert(node_id);
            }
            for transition in node.transitions() {
                let next = match transition.conditional_data() {
                    Some(added) => conditional.compose(&added)?,
                    None if transition.kind() == TransitionKind::Epsilon => conditional,
                    None => continue,
                };
                if visited.insert((transition.target(), next)) {
                    stack.push((transition.target(), next));
                }
            }
        }
        Ok(targets)
    }

    fn explore(&mut self, state: NodeID) -> Result<()> {
        let key = self.states[state].clone();
        let targets = self.transition_closure(&key.nodes)?;
        if key.conditional_target || targets.keys().all(|c| c.is_empty()) {
            self.add_input_transitions(state, &key.nodes);
            debug_assert!(
                !self.graph.node(state).has_conditional_transitions(),
                "conditional target {state} must not branch on conditionals again"
            );
        } else {
            self.add_conditional_transitions(state, &targets);
        }
        Ok(())
    }

    // The closure retains every node with input transitions, so the members' own input
    // transitions are complete.
    fn add_input_transitions(&mut self, state: NodeID, members: &DfaState) {
        let nfa = self.nfa;
        let graph = nfa.graph();
        let mut byte_targets: Vec<DfaState> = vec![DfaState::new(); 256];
        for member in members {
            for transition in graph.node(*member).transitions() {
                if let Some((first, last)) = transition.byte_range() {
                    for byte in first..=last {
                        byte_targets[byte as usize].insert(transition.target());
                    }
                }
            }
        }

        let mut resolved: BTreeMap<DfaState, NodeID> = BTreeMap::new();
        let mut byte_states: Vec<Option<NodeID>> = Vec::with_capacity(256);
        for target in byte_targets {
            if target.is_empty() {
                byte_states.push(None);
                continue;
            }
            let index = match resolved.get(&target) {
                Some(index) => *index,
                None => {
                    let index = self.dfa_state_index(target.clone(), false);
                    resolved.insert(target, index);
                    index
                }
            };
            byte_states.push(Some(index));
        }

        let runs = (0..=255u8)
            .zip(byte_states)
            .chunk_by(|(_, target)| *target);
        for (target, run) in &runs {
            let Some(target) = target else {
                continue;
            };
            let bytes = run.map(|(byte, _)| byte).collect::<Vec<_>>();
            let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
            let transition = if first == last {
                Transition::input_atom(first, target)
            } else {
                Transition::input_atom_range(first, last, target)
            };
            self.graph.add_transition(state, transition);
        }
    }

    fn add_conditional_transitions(&mut self, state: NodeID, targets: &TargetStateMap) {
        let mask = targets.keys().fold(0, |mask, c| mask | c.mask());
        for combination in Conditional::combinations(mask) {
            let union: DfaState = targets
                .iter()
                .filter(|(conditional, _)| !conditional.conflicts_with(&combination))
                .flat_map(|(_, nodes)| nodes.iter().copied())
                .collect();
            if union.is_empty() {
                continue;
            }
            let target = self.dfa_state_index(union, true);
            self.graph
                .add_transition(state, Transition::conditional(combination, target));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        nfa::generate_nfa, parser::parse_regex_syntax, transition_codec::transition_table,
        HandlerID, ScanForgeErrorKind,
    };

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // Accept nodes first, then the start node and one fragment per pattern.
    fn build_nfa(patterns: &[&str]) -> Automaton {
        let mut graph = Graph::new();
        for (i, _) in patterns.iter().enumerate() {
            graph.add_node(Some(NodeData::accept(HandlerID::new(i), format!("accept {i}"))));
        }
        let start = graph.add_node(Some(NodeData::start("INITIAL")));
        for (i, pattern) in patterns.iter().enumerate() {
            let rule_start = graph.add_node(Some(NodeData::intermediate()));
            let ast = parse_regex_syntax(pattern).unwrap();
            generate_nfa(&ast, &mut graph, rule_start, NodeID::new(i)).unwrap();
            graph.add_transition(start, Transition::epsilon(rule_start));
        }
        Automaton::new(graph, vec![start])
    }

    fn build_dfa(patterns: &[&str]) -> Automaton {
        generate_dfa(&build_nfa(patterns), patterns.len()).unwrap()
    }

    #[test]
    fn test_single_char() {
        init();
        let dfa = build_dfa(&["a"]);
        assert_eq!(dfa.node_count(), 2);
        assert_eq!(dfa.start_state_index(), &[NodeID::new(0)]);
        assert_eq!(
            dfa.accepting_nodes().collect::<Vec<_>>(),
            vec![(NodeID::new(1), HandlerID::new(0))]
        );
    }

    #[test]
    fn test_anchored_digits() {
        init();
        let dfa = build_dfa(&["^[0-9]+$"]);
        assert_eq!(dfa.node_count(), 5, "{}", transition_table(&dfa));
        let accepting = dfa.accepting_nodes().collect::<Vec<_>>();
        assert_eq!(accepting.len(), 1);
        assert_eq!(accepting[0].1, HandlerID::new(0));
    }

    #[test]
    fn test_range_compression() {
        init();
        let dfa = build_dfa(&["[a-z]x"]);
        let start = dfa.graph().node(dfa.start_state_index()[0]);
        let transitions = start.transitions().collect::<Vec<_>>();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].byte_range(), Some((b'a', b'z')));
    }

    #[test]
    fn test_lowest_handler_wins() {
        init();
        let dfa = build_dfa(&["a", "[a-c]"]);
        let handlers = dfa
            .accepting_nodes()
            .map(|(_, h)| h.as_usize())
            .sorted()
            .collect::<Vec<_>>();
        // 'a' accepts with handler 0, 'b' and 'c' with handler 1
        assert_eq!(handlers, vec![0, 1]);
    }

    #[test]
    fn test_conditional_states() {
        init();
        let dfa = build_dfa(&[
            r"\ba+\b",
            "^b",
            r"x$|x\z",
            r"(?:^|\b)(?:$|\ba)",
            r"^\b\w+\b$",
        ]);
        let graph = dfa.graph();
        for (index, node) in graph.nodes() {
            let conditionals = node
                .transitions()
                .filter_map(|t| t.conditional_data())
                .collect::<Vec<_>>();
            if conditionals.is_empty() {
                continue;
            }
            // Conditional states don't consume input
            assert!(!node.has_input_transitions(), "state {index}");
            // The branches of a state are pairwise exclusive
            for (a, b) in conditionals.iter().tuple_combinations() {
                assert!(a.conflicts_with(b), "state {index}: {a} and {b}");
            }
            // Conditional targets don't branch again
            for transition in node.transitions() {
                assert!(!graph.node(transition.target()).has_conditional_transitions());
            }
        }
    }

    #[test]
    fn test_deterministic() {
        init();
        let patterns = [r"\bfoo\b", "f[o0]+", "(?i)bar|baz", "^[0-9]+$"];
        assert_eq!(
            transition_table(&build_dfa(&patterns)),
            transition_table(&build_dfa(&patterns))
        );
    }

    #[test]
    fn test_conflicting_conditionals() {
        init();
        let err = generate_dfa(&build_nfa(&[r"a\b\B"]), 1).unwrap_err();
        assert!(matches!(
            err.kind(),
            ScanForgeErrorKind::ConflictingConditional { .. }
        ));
    }

    #[test]
    fn test_empty_mode() {
        init();
        let mut graph = Graph::new();
        let start = graph.add_node(Some(NodeData::start("EMPTY")));
        let dfa = generate_dfa(&Automaton::new(graph, vec![start]), 0).unwrap();
        assert_eq!(dfa.node_count(), 1);
        assert_eq!(dfa.graph().transition_count(), 0);
    }
}
