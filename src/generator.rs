//! This module contains the source generator for compiled scanners.
//! The generated source holds the DFA tables as Rust constants.

use crate::{
    compiler::CompiledScanner,
    tables::{AutomatonTables, NO_HANDLER},
    Result,
};
use itertools::Itertools;
use log::trace;
use std::time::Instant;

/// Generate the table source of a compiled scanner.
/// # Arguments
/// * `scanner` - The compiled scanner.
/// * a Write trait object that receives the generated code.
/// # Errors
/// An error is returned if writing to the output fails.
pub fn generate_code(scanner: &CompiledScanner, output: &mut dyn std::io::Write) -> Result<()> {
    let now = Instant::now();
    let dfa = scanner.dfa();
    let tables = AutomatonTables::new(dfa);

    writeln!(
        output,
        r"// Generated scanner tables. Do not edit.

pub const NO_HANDLER: u32 = u32::MAX;
"
    )?;
    writeln!(
        output,
        "pub const MODE_NAMES: &[&str; {}] = &[{}];",
        scanner.mode_names().len(),
        scanner
            .mode_names()
            .iter()
            .map(|name| format!("\"{}\"", name.escape_default()))
            .join(", ")
    )?;
    writeln!(
        output,
        "pub const START_STATES: &[u32; {}] = &[{}];",
        tables.start_states.len(),
        tables.start_states.iter().join(", ")
    )?;
    writeln!(
        output,
        "pub const ACCEPT_HANDLERS: &[u32; {}] = &[{}];",
        tables.accept_handlers.len(),
        tables
            .accept_handlers
            .iter()
            .map(|h| match *h {
                NO_HANDLER => "NO_HANDLER".to_string(),
                h => h.to_string(),
            })
            .join(", ")
    )?;
    writeln!(
        output,
        "pub const STATE_RANGES: &[(usize, usize); {}] = &[{}];",
        tables.state_ranges.len(),
        tables
            .state_ranges
            .iter()
            .map(|(offset, count)| format!("({offset}, {count})"))
            .join(", ")
    )?;
    writeln!(
        output,
        "pub const TRANSITIONS: &[(u32, u32, u32, u32); {}] = &[",
        tables.transitions.len()
    )?;
    for (state, node) in dfa.graph().nodes() {
        if node.transition_count() > 0 {
            writeln!(output, "    /* {} */", state)?;
        }
        let (offset, count) = tables.state_ranges[state.as_usize()];
        for (entry, transition) in tables.transitions[offset..offset + count]
            .iter()
            .zip(node.transitions())
        {
            let (kind, data0, data1, target) = entry;
            writeln!(
                output,
                "    ({kind}, {data0}, {data1}, {target}), // {}",
                transition.label()
            )?;
        }
    }
    writeln!(output, "];")?;

    let elapsed_time = now.elapsed();
    trace!(
        "Code generation took {} milliseconds.",
        elapsed_time.as_millis()
    );
    Ok(())
}
