//! Labels for transitions and conditionals, used in dot output and textual table dumps.

use std::fmt::Write as _;

use crate::{
    automaton::Automaton,
    conditional::{type_from_conditional, Conditional, ConditionalType},
    graph::{Transition, TransitionKind},
};

/// Render a byte the way it would be written in a regex character class.
pub(crate) fn byte_label(byte: u8) -> String {
    match byte {
        b'\n' => "'\\n'".to_string(),
        b'\r' => "'\\r'".to_string(),
        b'\t' => "'\\t'".to_string(),
        b'\'' => "'\\''".to_string(),
        b'\\' => "'\\\\'".to_string(),
        b' '..=b'~' => format!("'{}'", byte as char),
        _ => format!("{byte:#04x}"),
    }
}

pub(crate) fn conditional_type_label(conditional_type: ConditionalType) -> &'static str {
    match conditional_type {
        ConditionalType::BeginningOfInput => "\\A",
        ConditionalType::NotBeginningOfInput => "!\\A",
        ConditionalType::EndOfInput => "\\z",
        ConditionalType::NotEndOfInput => "!\\z",
        ConditionalType::BeginningOfLine => "^",
        ConditionalType::NotBeginningOfLine => "!^",
        ConditionalType::EndOfLine => "$",
        ConditionalType::NotEndOfLine => "!$",
        ConditionalType::WordBoundary => "\\b",
        ConditionalType::NotWordBoundary => "\\B",
    }
}

pub(crate) fn transition_label(kind: TransitionKind, data: [u32; 2]) -> String {
    match kind {
        TransitionKind::InputAtom => byte_label(data[0] as u8),
        TransitionKind::InputAtomRange => {
            format!("{}-{}", byte_label(data[0] as u8), byte_label(data[1] as u8))
        }
        TransitionKind::Conditional => {
            Conditional::new(data[0] as u8, data[1] as u8).to_string()
        }
        TransitionKind::Epsilon => "ε".to_string(),
    }
}

pub(crate) fn transition_color(kind: TransitionKind) -> u32 {
    match kind {
        TransitionKind::InputAtom | TransitionKind::InputAtomRange => 0x000000,
        TransitionKind::Conditional => 0x0000ff,
        TransitionKind::Epsilon => 0x808080,
    }
}

impl std::fmt::Display for Conditional {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "*");
        }
        let mut remaining = *self;
        while !remaining.is_empty() {
            write!(
                f,
                "{}",
                conditional_type_label(type_from_conditional(&mut remaining))
            )?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.label(), self.target())
    }
}

/// Dump all nodes and transitions of an automaton as text, one node per line.
pub fn transition_table(automaton: &Automaton) -> String {
    let mut out = String::new();
    for (index, node) in automaton.graph().nodes() {
        let mut markers = String::new();
        if automaton.start_state_index().contains(&index) {
            markers.push_str(" start");
        }
        if let Some(data) = node.data() {
            if data.is_accept {
                let _ = write!(markers, " accept({})", data.accept_handler_index);
            }
        }
        let _ = write!(out, "{index}{markers}:");
        for transition in node.transitions() {
            let _ = write!(out, " [{transition}]");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{conditional::conditional_from_type, ids::NodeID};

    #[test]
    fn test_byte_label() {
        assert_eq!(byte_label(b'a'), "'a'");
        assert_eq!(byte_label(b'\n'), "'\\n'");
        assert_eq!(byte_label(b' '), "' '");
        assert_eq!(byte_label(0x07), "0x07");
        assert_eq!(byte_label(0xff), "0xff");
    }

    #[test]
    fn test_transition_labels() {
        let target = NodeID::new(3);
        assert_eq!(Transition::input_atom(b'x', target).label(), "'x'");
        assert_eq!(
            Transition::input_atom_range(b'0', b'9', target).label(),
            "'0'-'9'"
        );
        assert_eq!(Transition::epsilon(target).label(), "ε");
        assert_eq!(Transition::epsilon(target).color(), 0x808080);
        assert_eq!(Transition::input_atom(b'x', target).color(), 0x000000);
        assert_eq!(
            Transition::conditional(
                conditional_from_type(ConditionalType::NotWordBoundary),
                target
            )
            .to_string(),
            "\\B -> 3"
        );
    }

    #[test]
    fn test_conditional_display() {
        let composed = conditional_from_type(ConditionalType::BeginningOfLine)
            .compose(&conditional_from_type(ConditionalType::NotEndOfInput))
            .unwrap();
        assert_eq!(composed.to_string(), "!\\z^");
        assert_eq!(Conditional::EMPTY.to_string(), "*");
    }
}
