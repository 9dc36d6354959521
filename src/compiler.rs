//! This module contains the compilation of a [`RuleSet`] into the NFA and the DFA of a scanner.
//!
//! The NFA is laid out as follows:
//! * Nodes `0..N` are the accept nodes, one per rule over all scanner modes. The node index is the
//!   handler index of the rule.
//! * Each scanner mode has a start node, labeled with the mode's name, with an epsilon transition
//!   to the start node of each of its rules.
//!
//! A rule that fails to compile doesn't stop the compilation. Its error is recorded as a
//! [`Diagnostic`] and all diagnostics are returned together at the end.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    time::Instant,
};

use log::{debug, trace, warn};

use crate::{
    automaton::{Automaton, NodeData},
    dfa::generate_dfa,
    graph::{Graph, Transition},
    nfa::{generate_nfa, verify_conditional_paths},
    parser::parse_regex_syntax,
    rule_set::{expand_macros, expand_macros_tracking, Rule, RuleSet, ScannerMode},
    HandlerID, NodeID, Result, ScanForgeError, ScanForgeErrorKind,
};

/// Where a diagnostic comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticOrigin {
    /// A macro definition.
    Macro {
        /// The name of the macro.
        name: String,
    },
    /// A rule of a scanner mode.
    Rule {
        /// The name of the scanner mode.
        mode: String,
        /// The index of the rule within its mode.
        index: usize,
        /// The line of the rule, if known.
        line: Option<usize>,
    },
}

/// An error of a single rule or macro.
#[derive(Debug)]
pub struct Diagnostic {
    /// The macro or rule that failed.
    pub origin: DiagnosticOrigin,
    /// The regex source text as written.
    pub pattern: String,
    /// The error.
    pub error: ScanForgeError,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.origin {
            DiagnosticOrigin::Macro { name } => write!(f, "Macro '{name}'")?,
            DiagnosticOrigin::Rule { mode, index, line } => {
                write!(f, "Mode '{mode}', rule #{index}")?;
                if let Some(line) = line {
                    write!(f, " (line {line})")?;
                }
            }
        }
        write!(f, " '{}': {}", self.pattern, self.error)
    }
}

/// The result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledScanner {
    nfa: Automaton,
    dfa: Automaton,
    accept_handler_count: usize,
    mode_names: Vec<String>,
}

impl CompiledScanner {
    /// Get the NFA.
    pub fn nfa(&self) -> &Automaton {
        &self.nfa
    }

    /// Get the DFA. Its start states are in the order of the scanner modes.
    pub fn dfa(&self) -> &Automaton {
        &self.dfa
    }

    /// Get the number of accept handlers, i.e. the number of rules over all modes.
    pub fn accept_handler_count(&self) -> usize {
        self.accept_handler_count
    }

    /// Get the names of the scanner modes.
    pub fn mode_names(&self) -> &[String] {
        &self.mode_names
    }

    /// Get the index of the scanner mode with the given name.
    pub fn mode_index(&self, name: &str) -> Option<usize> {
        self.mode_names.iter().position(|m| m == name)
    }
}

/// The state of a compilation pass.
#[derive(Debug)]
pub struct CompilationContext<'r> {
    rule_set: &'r RuleSet,
    // Macros that failed to compile. Rules that use them are skipped without a second report.
    broken_macros: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
    next_handler: usize,
    graph: Graph<NodeData>,
    start_states: Vec<NodeID>,
}

impl<'r> CompilationContext<'r> {
    /// Create a context for the rule set. The accept nodes of all rules are created up front.
    pub fn new(rule_set: &'r RuleSet) -> Self {
        let mut graph = Graph::new();
        for handler in 0..rule_set.rule_count() {
            graph.add_node(Some(NodeData::accept(
                HandlerID::new(handler),
                format!("accept {handler}"),
            )));
        }
        CompilationContext {
            rule_set,
            broken_macros: BTreeSet::new(),
            diagnostics: Vec::new(),
            next_handler: 0,
            graph,
            start_states: Vec::new(),
        }
    }

    /// Get the diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Compile every macro on its own so that a broken macro is reported once, against itself.
    pub fn check_macros(&mut self) {
        let rule_set = self.rule_set;
        let macros: &BTreeMap<String, String> = rule_set.macros();
        for (name, pattern) in macros {
            let result = expand_macros(pattern, macros)
                .and_then(|expanded| parse_regex_syntax(&expanded));
            if let Err(error) = result {
                self.broken_macros.insert(name.clone());
                self.report(Diagnostic {
                    origin: DiagnosticOrigin::Macro { name: name.clone() },
                    pattern: pattern.clone(),
                    error,
                });
            }
        }
    }

    /// Add the start node of the scanner mode and compile its rules.
    pub fn add_mode(&mut self, mode: &ScannerMode) {
        let mode_start = self.graph.add_node(Some(NodeData::start(mode.name.as_str())));
        self.start_states.push(mode_start);
        for (index, rule) in mode.rules.iter().enumerate() {
            let handler = HandlerID::new(self.next_handler);
            self.next_handler += 1;
            match self.add_rule(rule, handler) {
                Ok(Some(rule_start)) => {
                    self.graph
                        .add_transition(mode_start, Transition::epsilon(rule_start));
                }
                Ok(None) => {
                    debug!(
                        "Mode '{}', rule #{index} skipped, it uses a broken macro.",
                        mode.name
                    );
                }
                Err(error) => self.report(Diagnostic {
                    origin: DiagnosticOrigin::Rule {
                        mode: mode.name.clone(),
                        index,
                        line: rule.line,
                    },
                    pattern: rule.pattern.clone(),
                    error,
                }),
            }
        }
    }

    // Returns the start node of the rule's fragment or None if the rule uses a broken macro.
    // The fragment is connected to the mode only after it has been built and verified.
    fn add_rule(&mut self, rule: &Rule, handler: HandlerID) -> Result<Option<NodeID>> {
        let mut used_macros = BTreeSet::new();
        let expanded =
            expand_macros_tracking(&rule.pattern, self.rule_set.macros(), &mut used_macros)?;
        if !used_macros.is_disjoint(&self.broken_macros) {
            return Ok(None);
        }
        let ast = parse_regex_syntax(&expanded)?;
        let first_node = self.graph.node_count();
        let rule_start = self.graph.add_node(Some(NodeData::intermediate()));
        generate_nfa(&ast, &mut self.graph, rule_start, NodeID::new(handler.as_usize()))?;
        verify_conditional_paths(&self.graph, first_node..self.graph.node_count())?;
        trace!(
            "Rule '{}' compiled to NFA nodes {first_node}..{}",
            rule.pattern,
            self.graph.node_count()
        );
        Ok(Some(rule_start))
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Finish the compilation: fail with all recorded diagnostics or generate the DFA.
    pub fn finish(self) -> Result<CompiledScanner> {
        if !self.diagnostics.is_empty() {
            return Err(ScanForgeError::new(ScanForgeErrorKind::CompilationFailed(
                self.diagnostics,
            )));
        }
        let accept_handler_count = self.rule_set.rule_count();
        let nfa = Automaton::new(self.graph, self.start_states);
        let dfa = generate_dfa(&nfa, accept_handler_count)?;
        Ok(CompiledScanner {
            nfa,
            dfa,
            accept_handler_count,
            mode_names: self
                .rule_set
                .modes()
                .iter()
                .map(|m| m.name.clone())
                .collect(),
        })
    }
}

/// Compile the rule set into the NFA and the DFA of a scanner.
/// # Errors
/// `CompilationFailed` with the diagnostics of all failed rules and macros, or the error of the
/// DFA generation.
pub fn compile(rule_set: &RuleSet) -> Result<CompiledScanner> {
    let now = Instant::now();
    let mut context = CompilationContext::new(rule_set);
    context.check_macros();
    for mode in rule_set.modes() {
        context.add_mode(mode);
    }
    let compiled = context.finish()?;
    debug!(
        "Compiled {} modes with {} rules into {} NFA and {} DFA nodes in {} milliseconds.",
        compiled.mode_names.len(),
        compiled.accept_handler_count,
        compiled.nfa.node_count(),
        compiled.dfa.node_count(),
        now.elapsed().as_millis()
    );
    Ok(compiled)
}
