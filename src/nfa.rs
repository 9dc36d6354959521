//! This module contains the Thompson construction of the NFA.
//! Each AST node kind is compiled into a fragment of the graph between a given start and end node.
//! The builder only appends nodes and transitions, it never changes existing ones.

use std::{collections::HashSet, ops::Range, time::Instant};

use log::trace;

use crate::{
    automaton::NodeData,
    conditional::{conditional_from_type, Conditional},
    graph::{Graph, Transition, TransitionKind},
    regex_ast::{opposite_case, Atom, BakedControlChar, Branch, Piece, RegularExpression},
    NodeID, Result, ScanForgeError, ScanForgeErrorKind,
};

/// Compile the regular expression into the graph, between `start` and `end`.
/// # Errors
/// Returns `EmptyBracketExpression` if a bracket expression can't match any byte under the case
/// sensitivity in effect.
pub fn generate_nfa(
    ast: &RegularExpression,
    graph: &mut Graph<NodeData>,
    start: NodeID,
    end: NodeID,
) -> Result<()> {
    let now = Instant::now();
    let first_new_node = graph.node_count();
    let mut builder = NfaBuilder {
        graph,
        case_sensitive: Vec::new(),
    };
    builder.regular_expression(ast, start, end)?;
    trace!(
        "NFA fragment with {} new nodes built in {} microseconds.",
        builder.graph.node_count() - first_new_node,
        now.elapsed().as_micros()
    );
    Ok(())
}

/// Explore every zero-width path that starts in one of the given nodes and compose the
/// conditionals found along the path.
/// # Errors
/// Returns `ConflictingConditional` for the first path whose conditionals can't hold together.
pub fn verify_conditional_paths(graph: &Graph<NodeData>, nodes: Range<usize>) -> Result<()> {
    let mut visited: HashSet<(NodeID, Conditional)> = HashSet::new();
    let mut stack: Vec<(NodeID, Conditional)> = Vec::new();
    for node in nodes.map(NodeID::new) {
        if visited.insert((node, Conditional::EMPTY)) {
            stack.push((node, Conditional::EMPTY));
        }
        while let Some((current, conditional)) = stack.pop() {
            for transition in graph.node(current).transitions() {
                let next = match transition.kind() {
                    TransitionKind::Epsilon => conditional,
                    TransitionKind::Conditional => {
                        // The conditional data is always present for conditional transitions
                        let added = transition.conditional_data().unwrap_or_default();
                        conditional.compose(&added)?
                    }
                    TransitionKind::InputAtom | TransitionKind::InputAtomRange => continue,
                };
                if visited.insert((transition.target(), next)) {
                    stack.push((transition.target(), next));
                }
            }
        }
    }
    Ok(())
}

struct NfaBuilder<'a> {
    graph: &'a mut Graph<NodeData>,
    // One entry per enclosing regular expression, true means case-sensitive.
    case_sensitive: Vec<bool>,
}

impl NfaBuilder<'_> {
    fn new_node(&mut self) -> NodeID {
        self.graph.add_node(Some(NodeData::intermediate()))
    }

    // Alternatives can produce the same edge twice, e.g. `a|a`.
    fn add(&mut self, source: NodeID, transition: Transition) {
        if !self.graph.has_transition(source, &transition) {
            self.graph.add_transition(source, transition);
        }
    }

    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive.last().copied().unwrap_or(true)
    }

    fn regular_expression(
        &mut self,
        regex: &RegularExpression,
        start: NodeID,
        end: NodeID,
    ) -> Result<()> {
        self.case_sensitive.push(self.is_case_sensitive());
        let result = self.branches(regex, start, end);
        self.case_sensitive.pop();
        result
    }

    fn branches(&mut self, regex: &RegularExpression, start: NodeID, end: NodeID) -> Result<()> {
        if regex.branches.is_empty() {
            self.add(start, Transition::epsilon(end));
            return Ok(());
        }
        let branching = self.new_node();
        self.add(start, Transition::epsilon(branching));
        for branch in &regex.branches {
            self.branch(branch, branching, end)?;
        }
        Ok(())
    }

    fn branch(&mut self, branch: &Branch, start: NodeID, end: NodeID) -> Result<()> {
        if branch.pieces.is_empty() {
            self.add(start, Transition::epsilon(end));
            return Ok(());
        }
        let mut current = start;
        for (i, piece) in branch.pieces.iter().enumerate() {
            let next = if i + 1 == branch.pieces.len() {
                end
            } else {
                self.new_node()
            };
            self.piece(piece, current, next)?;
            current = next;
        }
        Ok(())
    }

    fn piece(&mut self, piece: &Piece, start: NodeID, end: NodeID) -> Result<()> {
        let bound = piece.bound;
        let lower = bound.lower() as usize;
        if !bound.is_unbounded() && bound.lower() == bound.upper() {
            return self.mandatory(&piece.atom, lower, start, end);
        }
        if lower == 0 && !bound.is_unbounded() {
            return self.optional(&piece.atom, bound.upper() as usize, start, end);
        }
        let repeat = self.new_node();
        if lower == 0 {
            self.add(start, Transition::epsilon(repeat));
        } else {
            self.mandatory(&piece.atom, lower, start, repeat)?;
        }
        if bound.is_unbounded() {
            self.atom(&piece.atom, repeat, repeat)?;
            self.add(repeat, Transition::epsilon(end));
            Ok(())
        } else {
            let optional = (bound.upper() - bound.lower()) as usize;
            self.optional(&piece.atom, optional, repeat, end)
        }
    }

    // `count` repetitions in sequence, `count` is at least one.
    fn mandatory(&mut self, atom: &Atom, count: usize, start: NodeID, end: NodeID) -> Result<()> {
        debug_assert!(count > 0);
        let mut current = start;
        for i in 0..count {
            let next = if i + 1 == count { end } else { self.new_node() };
            self.atom(atom, current, next)?;
            current = next;
        }
        Ok(())
    }

    // Up to `count` repetitions, each of them can be skipped to `end`.
    fn optional(&mut self, atom: &Atom, count: usize, start: NodeID, end: NodeID) -> Result<()> {
        let mut current = start;
        for i in 0..count {
            self.add(current, Transition::epsilon(end));
            let next = if i + 1 == count { end } else { self.new_node() };
            self.atom(atom, current, next)?;
            current = next;
        }
        Ok(())
    }

    fn atom(&mut self, atom: &Atom, start: NodeID, end: NodeID) -> Result<()> {
        match atom {
            Atom::Char(byte) => {
                self.add(start, Transition::input_atom(*byte, end));
                if !self.is_case_sensitive() {
                    if let Some(other) = opposite_case(*byte) {
                        self.add(start, Transition::input_atom(other, end));
                    }
                }
            }
            Atom::Conditional(conditional_type) => {
                self.add(
                    start,
                    Transition::conditional(conditional_from_type(*conditional_type), end),
                );
            }
            Atom::BakedControlChar(control) => {
                self.add(start, Transition::epsilon(end));
                let case_sensitive = matches!(control, BakedControlChar::CaseSensitive);
                match self.case_sensitive.last_mut() {
                    Some(top) => *top = case_sensitive,
                    None => self.case_sensitive.push(case_sensitive),
                }
            }
            Atom::BracketCharSet(bracket) => {
                let set = bracket.effective_set(self.is_case_sensitive());
                if set.is_empty() {
                    return Err(ScanForgeError::new(
                        ScanForgeErrorKind::EmptyBracketExpression,
                    ));
                }
                for (first, last) in set.ranges() {
                    let transition = if first == last {
                        Transition::input_atom(first, end)
                    } else {
                        Transition::input_atom_range(first, last, end)
                    };
                    self.add(start, transition);
                }
            }
            Atom::Group(regex) => self.regular_expression(regex, start, end)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_regex_syntax, HandlerID};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn build(pattern: &str) -> Result<(Graph<NodeData>, NodeID, NodeID)> {
        let mut graph = Graph::new();
        let start = graph.add_node(Some(NodeData::start("test")));
        let end = graph.add_node(Some(NodeData::accept(HandlerID::new(0), "accept")));
        let ast = parse_regex_syntax(pattern)?;
        generate_nfa(&ast, &mut graph, start, end)?;
        Ok((graph, start, end))
    }

    fn input_bytes(graph: &Graph<NodeData>) -> Vec<u8> {
        let mut bytes: Vec<u8> = graph
            .nodes()
            .flat_map(|(_, n)| n.transitions())
            .filter(|t| t.kind() == TransitionKind::InputAtom)
            .map(|t| t.data()[0] as u8)
            .collect();
        bytes.sort();
        bytes.dedup();
        bytes
    }

    #[test]
    fn test_single_char() {
        init();
        let (graph, start, end) = build("a").unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.transition_count(), 2);
        let branching = graph.node(start).transitions().next().unwrap().target();
        let transition = graph.node(branching).transitions().next().unwrap();
        assert_eq!(transition.kind(), TransitionKind::InputAtom);
        assert_eq!(transition.target(), end);
    }

    #[test]
    fn test_case_folding() {
        init();
        let (graph, ..) = build("(?i)a").unwrap();
        assert_eq!(input_bytes(&graph), vec![b'A', b'a']);
        let (graph, ..) = build("(?i)5").unwrap();
        assert_eq!(input_bytes(&graph), vec![b'5']);
        // The flag ends with the enclosing group
        let (graph, ..) = build("(?:(?i)a)b").unwrap();
        assert_eq!(input_bytes(&graph), vec![b'A', b'a', b'b']);
    }

    #[test]
    fn test_bracket_compression() {
        init();
        let (graph, ..) = build("[a-c]").unwrap();
        let ranges: Vec<[u32; 2]> = graph
            .nodes()
            .flat_map(|(_, n)| n.transitions())
            .filter(|t| t.kind() == TransitionKind::InputAtomRange)
            .map(|t| t.data())
            .collect();
        assert_eq!(ranges, vec![[b'a' as u32, b'c' as u32]]);
        assert!(input_bytes(&graph).is_empty());

        let (graph, ..) = build("[ac]").unwrap();
        assert_eq!(input_bytes(&graph), vec![b'a', b'c']);
    }

    #[test]
    fn test_empty_bracket_after_folding() {
        init();
        assert!(build(r"[^\x00-\x60\x62-\xff]").is_ok());
        let err = build(r"(?i)[^\x00-\x60\x62-\xff]").unwrap_err();
        assert!(matches!(
            err.kind(),
            ScanForgeErrorKind::EmptyBracketExpression
        ));
    }

    #[test]
    fn test_duplicate_alternatives() {
        init();
        let (graph, ..) = build("a|a").unwrap();
        assert_eq!(graph.transition_count(), 2);
        assert!(build("(|)").is_ok());
    }

    #[test]
    fn test_kleene_loop_on_fresh_node() {
        init();
        let (graph, start, _) = build("a*|b").unwrap();
        let loops: Vec<NodeID> = graph
            .nodes()
            .filter(|(i, n)| n.transitions().any(|t| t.target() == *i))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(loops.len(), 1);
        assert_ne!(loops[0], start);
        // The loop node doesn't see the sibling alternative
        assert!(graph
            .node(loops[0])
            .transitions()
            .all(|t| t.data()[0] != b'b' as u32 || t.is_zero_width()));
    }

    #[test]
    fn test_bounded_repetition_shape() {
        init();
        // a{2,4}: start, end, branching, one inner mandatory node, the repeat node and one inner
        // optional node
        let (graph, ..) = build("a{2,4}").unwrap();
        assert_eq!(graph.node_count(), 6);
        let atoms = graph
            .nodes()
            .flat_map(|(_, n)| n.transitions())
            .filter(|t| !t.is_zero_width())
            .count();
        assert_eq!(atoms, 4);
    }

    #[test]
    fn test_conditional_paths() {
        init();
        let (graph, ..) = build(r"^a$").unwrap();
        assert!(verify_conditional_paths(&graph, 0..graph.node_count()).is_ok());

        let (graph, ..) = build(r"\b\B").unwrap();
        let err = verify_conditional_paths(&graph, 0..graph.node_count()).unwrap_err();
        assert!(matches!(
            err.kind(),
            ScanForgeErrorKind::ConflictingConditional { .. }
        ));

        // Conflicts only count on a common zero-width path
        let (graph, ..) = build(r"\b|\B").unwrap();
        assert!(verify_conditional_paths(&graph, 0..graph.node_count()).is_ok());
    }
}
