#![forbid(missing_docs)]
//! The `scanforge` crate compiles the rules of a lexical scanner into a DFA.
//! Each rule is a regex that can contain zero-width assertions like `^`, `$`, `\A`, `\z`, `\b` and
//! `\B`. The rules are lowered into a Thompson NFA, which is converted into a DFA by the subset
//! construction. The assertions survive as conditional transitions, so the DFA decides them at
//! match time from the bytes around the current position.

/// Module with error definitions
mod errors;
pub use errors::{Result, ScanForgeError, ScanForgeErrorKind};

/// Module that provides types for integer ids that can also be used to index into slices.
mod ids;
pub use ids::{HandlerID, NodeID};

/// The conditional module contains the algebra of the zero-width assertions.
mod conditional;
pub use conditional::{
    conditional_from_type, is_word_byte, live_flags, type_from_conditional, Combinations,
    Conditional, ConditionalType, ALL_CONDITIONAL_BITS, BEGINNING_OF_INPUT, BEGINNING_OF_LINE,
    CONDITIONAL_FLAG_COMBINATIONS, END_OF_INPUT, END_OF_LINE, WORD_BOUNDARY,
};

/// The graph module contains the node arena both automata are built in.
mod graph;
pub use graph::{Graph, Node, Transition, TransitionKind};

/// Module with the textual labels of transitions.
mod transition_codec;
pub use transition_codec::transition_table;

/// The automaton module contains the automaton type shared by the NFA and the DFA.
mod automaton;
pub use automaton::{Automaton, NodeData};

/// The regex_ast module contains the regex AST the NFA is built from.
mod regex_ast;
pub use regex_ast::{
    Atom, BakedControlChar, Bound, BracketCharSet, Branch, ByteSet, Piece, PosixClass,
    RegularExpression,
};

/// The parser module contains the regex syntax parser.
mod parser;
pub use parser::{lower_ast, parse_regex_syntax};

/// The nfa module contains the Thompson construction.
mod nfa;
pub use nfa::{generate_nfa, verify_conditional_paths};

/// The dfa module contains the subset construction.
mod dfa;
pub use dfa::{generate_dfa, DfaState};

/// Module with the scanner description: modes, rules and macros.
mod rule_set;
pub use rule_set::{expand_macros, Rule, RuleSet, ScannerMode};

/// The compiler module turns a rule set into a compiled scanner.
mod compiler;
pub use compiler::{compile, CompilationContext, CompiledScanner, Diagnostic, DiagnosticOrigin};

/// Module with the flattened tables of an automaton.
mod tables;
pub use tables::{AutomatonTables, FastState, FastTransitions, TableTransition, NO_HANDLER};

/// The matcher module contains the longest-match execution.
mod matcher;
pub use matcher::{nfa_longest_match, FindMatches, Match};

/// Module with conversion to graphviz dot format
mod dot;
pub use dot::render_to;

/// The generator module contains the code generator.
/// The code generator writes the tables of a compiled scanner as Rust source.
mod generator;
pub use generator::generate_code;
