//! Output formatting utilities for the CLI.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{Hypothesis, Step};

/// Result of a command, printable for humans or as JSON.
pub trait CommandOutput: Serialize {
    /// Plain-text rendering.
    fn to_human(&self) -> String;
    /// JSON rendering used with `--json`.
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` in the selected mode.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Table with the shared preset and the given header.
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

/// One row per step: number, states, counterexample, queries, errors.
pub fn steps_table(steps: &[Step]) -> Table {
    let mut table = table(&[
        "STEP", "STATES", "COUNTEREXAMPLE", "MQS", "SYMBOLS", "EQS", "MS", "ERROR",
    ]);
    for step in steps {
        let stats = &step.statistics;
        table.add_row(vec![
            step.step_no.to_string(),
            step.hypothesis
                .as_ref()
                .map_or_else(|| "-".to_string(), |h| h.size().to_string()),
            step.counter_example
                .as_ref()
                .map_or_else(|| "-".to_string(), |ce| truncate(&ce.to_string(), 40)),
            stats.mqs_used.total().to_string(),
            stats.symbols_used.total().to_string(),
            stats.eqs_used.to_string(),
            stats.duration_ms.total().to_string(),
            step.error_text
                .as_deref()
                .map_or_else(String::new, |e| truncate(e, 40)),
        ]);
    }
    table
}

/// Transition table of a hypothesis; the initial state is marked with `>`.
pub fn hypothesis_table(hypothesis: &Hypothesis) -> Table {
    let mut header = vec!["STATE".to_string()];
    header.extend(hypothesis.inputs().iter().cloned());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for (state, row) in hypothesis.transitions().iter().enumerate() {
        let marker = if state == hypothesis.initial() { ">" } else { "" };
        let mut cells = vec![format!("{marker}s{state}")];
        cells.extend(
            row.iter()
                .map(|edge| format!("{} / s{}", edge.output, edge.target)),
        );
        table.add_row(cells);
    }
    table
}
