//! Implementation of the `statelearner compare` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{render_word, Word};

use super::load_target;

/// Find a word on which two machines differ
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First machine (target YAML, e.g. from `results export`)
    pub first: PathBuf,

    /// Second machine
    pub second: PathBuf,
}

/// Outcome of `compare`.
#[derive(Debug, Serialize)]
pub struct CompareOutput {
    /// Whether no separating word exists.
    pub equivalent: bool,
    /// Shortest word with different outputs.
    pub separating_word: Option<Word>,
    /// Output of the first machine for the separating word.
    pub first_output: Option<Word>,
    /// Output of the second machine for the separating word.
    pub second_output: Option<Word>,
}

impl CommandOutput for CompareOutput {
    fn to_human(&self) -> String {
        match &self.separating_word {
            None => "The machines are equivalent.".to_string(),
            Some(word) => {
                let render = |w: &Option<Word>| w.as_deref().map(render_word).unwrap_or_default();
                format!(
                    "The machines differ on: {}\n  first:  {}\n  second: {}",
                    render_word(word),
                    render(&self.first_output),
                    render(&self.second_output)
                )
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run `compare`.
pub fn execute(args: CompareArgs, json_mode: bool) -> Result<()> {
    let first = load_target(&args.first)?;
    let second = load_target(&args.second)?;

    let inputs: Vec<String> = first
        .symbols()
        .into_iter()
        .chain(second.symbols())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let first = first.to_hypothesis(&inputs)?;
    let second = second.to_hypothesis(&inputs)?;

    let separating_word = first.separating_word(&second)?;
    let out = CompareOutput {
        equivalent: separating_word.is_none(),
        first_output: separating_word.as_ref().and_then(|w| first.output(w)),
        second_output: separating_word.as_ref().and_then(|w| second.output(w)),
        separating_word,
    };
    output(&out, json_mode);
    Ok(())
}
