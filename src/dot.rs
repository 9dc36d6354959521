//! The `dot` module contains the conversion from an automaton to a graphviz dot format.
//! The functions in this module are used for testing and debugging purposes.

use std::io::Write;

use dot_writer::{Attributes, DotWriter, RankDirection};

use crate::automaton::Automaton;

/// Render the automaton to a graphviz dot format.
/// Start nodes are blue, accept nodes are red and show their handler.
pub fn render_to<W: Write>(automaton: &Automaton, label: &str, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);
    // Nodes are created in index order, so `node_auto` names node i `node_i`
    for (index, node) in automaton.graph().nodes() {
        let source_id = {
            let mut source_node = digraph.node_auto();
            source_node.set_label(&index.to_string());
            if automaton.start_state_index().contains(&index) {
                source_node
                    .set_shape(dot_writer::Shape::Circle)
                    .set_color(dot_writer::Color::Blue)
                    .set_pen_width(3.0);
            }
            if let Some(handler) = automaton.accept_handler(index) {
                source_node
                    .set_color(dot_writer::Color::Red)
                    .set_pen_width(3.0)
                    .set_label(&format!("{}\n{}", index, handler));
            }
            source_node.id()
        };
        for transition in node.transitions() {
            digraph
                .edge(
                    source_id.clone(),
                    &format!("node_{}", transition.target().as_usize()),
                )
                .attributes()
                .set_label(&transition.label().escape_default().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compiler::compile, rule_set::RuleSet};

    #[test]
    fn test_render_to() {
        let mut rule_set = RuleSet::new();
        rule_set.add_mode("INITIAL").add_rule("^a+").add_rule("b");
        let compiled = compile(&rule_set).unwrap();

        let mut nfa_output = Vec::new();
        render_to(compiled.nfa(), "nfa", &mut nfa_output);
        let nfa_dot = String::from_utf8(nfa_output).unwrap();
        assert!(nfa_dot.starts_with("digraph"));
        assert!(nfa_dot.contains("label=\"nfa\""));

        let mut dfa_output = Vec::new();
        render_to(compiled.dfa(), "dfa", &mut dfa_output);
        let dfa_dot = String::from_utf8(dfa_output).unwrap();
        assert!(dfa_dot.contains("node_0"));
        assert_eq!(
            dfa_dot.matches("->").count(),
            compiled.dfa().graph().transition_count()
        );
    }
}
