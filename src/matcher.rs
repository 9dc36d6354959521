//! This module contains the longest-match execution of a scanner.
//!
//! [`FastTransitions::longest_match`] runs the DFA tables, [`nfa_longest_match`] simulates the
//! NFA directly and serves as the reference the DFA is checked against.

use std::collections::BTreeSet;

use crate::{
    automaton::Automaton,
    conditional::live_flags,
    graph::TransitionKind,
    tables::{FastState, FastTransitions},
    HandlerID, NodeID,
};

/// A match in the haystack.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Match {
    handler: HandlerID,
    start: usize,
    end: usize,
}

impl Match {
    /// Create a new match.
    pub fn new(handler: HandlerID, start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Match {
            handler,
            start,
            end,
        }
    }

    /// Get the handler of the matching rule.
    pub fn handler(&self) -> HandlerID {
        self.handler
    }

    /// Get the start of the match.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Get the end of the match.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Get the length of the match.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the match is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// Keeps the longest match, and the lowest handler among matches of equal length.
fn record(last_match: &mut Option<Match>, candidate: Match) {
    match last_match {
        Some(m) if m.end == candidate.end && m.handler <= candidate.handler => {}
        Some(m) if m.end > candidate.end => {}
        _ => *last_match = Some(candidate),
    }
}

impl FastTransitions {
    /// Find the longest match of the scanner mode at the start position.
    /// Among the rules that match the longest text the one with the lowest handler wins.
    /// Returns None if no rule matches or the mode doesn't exist.
    pub fn longest_match(&self, mode: usize, input: &[u8], start: usize) -> Option<Match> {
        if start > input.len() {
            return None;
        }
        let mut state = self.start_state(mode)?;
        let mut position = start;
        let mut last_match = None;
        loop {
            if let Some(handler) = self.accept_handler(state) {
                record(
                    &mut last_match,
                    Match::new(HandlerID::new(handler as usize), start, position),
                );
            }
            let next = match self.state(state) {
                FastState::Conditional { .. } => {
                    self.next_on_flags(state, live_flags(input, position))
                }
                FastState::Input { .. } => {
                    let next = input
                        .get(position)
                        .and_then(|byte| self.next_on_byte(state, *byte));
                    if next.is_some() {
                        position += 1;
                    }
                    next
                }
            };
            match next {
                Some(next) => state = next,
                None => break,
            }
        }
        last_match
    }

    /// Iterate over the non-empty, non-overlapping longest matches of the scanner mode.
    /// Input that no rule matches is skipped.
    pub fn find_iter<'t, 'h>(&'t self, mode: usize, input: &'h [u8]) -> FindMatches<'t, 'h> {
        FindMatches {
            transitions: self,
            mode,
            input,
            position: 0,
        }
    }
}

/// An iterator over all non-overlapping matches.
///
/// The lifetime parameters are as follows:
///
/// * `'t` represents the lifetime of the tables that produced this iterator.
/// * `'h` represents the lifetime of the haystack being searched.
///
/// This iterator can be created with the [`FastTransitions::find_iter`] method.
#[derive(Debug)]
pub struct FindMatches<'t, 'h> {
    transitions: &'t FastTransitions,
    mode: usize,
    input: &'h [u8],
    position: usize,
}

impl Iterator for FindMatches<'_, '_> {
    type Item = Match;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position < self.input.len() {
            match self
                .transitions
                .longest_match(self.mode, self.input, self.position)
            {
                Some(matched) if !matched.is_empty() => {
                    self.position = matched.end();
                    return Some(matched);
                }
                _ => self.position += 1,
            }
        }
        None
    }
}

// Follow epsilon transitions and the conditional transitions that hold under the flags.
fn zero_width_closure(nfa: &Automaton, seeds: BTreeSet<NodeID>, flags: u8) -> BTreeSet<NodeID> {
    let mut closure = seeds.clone();
    let mut stack: Vec<NodeID> = seeds.into_iter().collect();
    while let Some(node) = stack.pop() {
        for transition in nfa.graph().node(node).transitions() {
            let follow = match transition.kind() {
                TransitionKind::Epsilon => true,
                TransitionKind::Conditional => transition
                    .conditional_data()
                    .is_some_and(|c| c.accepts(flags)),
                TransitionKind::InputAtom | TransitionKind::InputAtomRange => false,
            };
            if follow && closure.insert(transition.target()) {
                stack.push(transition.target());
            }
        }
    }
    closure
}

/// Find the longest match of the scanner mode at the start position by simulating the NFA.
/// The result is the same as the one of [`FastTransitions::longest_match`] on the DFA of the NFA.
pub fn nfa_longest_match(
    nfa: &Automaton,
    mode: usize,
    input: &[u8],
    start: usize,
) -> Option<Match> {
    if start > input.len() {
        return None;
    }
    let mode_start = *nfa.start_state_index().get(mode)?;
    let mut position = start;
    let mut current = zero_width_closure(
        nfa,
        BTreeSet::from([mode_start]),
        live_flags(input, position),
    );
    let mut last_match = None;
    loop {
        if let Some(handler) = current.iter().filter_map(|n| nfa.accept_handler(*n)).min() {
            record(&mut last_match, Match::new(handler, start, position));
        }
        let Some(byte) = input.get(position) else {
            break;
        };
        let next: BTreeSet<NodeID> = current
            .iter()
            .flat_map(|n| nfa.graph().node(*n).transitions())
            .filter(|t| {
                t.byte_range()
                    .is_some_and(|(first, last)| (first..=last).contains(byte))
            })
            .map(|t| t.target())
            .collect();
        if next.is_empty() {
            break;
        }
        position += 1;
        current = zero_width_closure(nfa, next, live_flags(input, position));
    }
    last_match
}
