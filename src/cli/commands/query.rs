//! Implementation of the `statelearner query` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::connectors::ScriptedConnectorFactory;
use crate::adapters::memory::InMemoryLearnerResultRepository;
use crate::application::RunRegistry;
use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::{ProjectId, Word};
use crate::services::StrategyRegistry;

use super::{load_target, parse_word, target_alphabet};

/// Run one input word against a target and print the outputs
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// YAML file describing the target machine
    #[arg(short, long)]
    pub target: PathBuf,

    /// Input word, symbols separated by spaces
    pub word: String,

    /// Project the query is attributed to in logs
    #[arg(short, long, default_value = "1")]
    pub project: ProjectId,
}

/// Outcome of `query`.
#[derive(Debug, Serialize)]
pub struct QueryOutput {
    /// Word sent after the reset.
    pub input: Word,
    /// One output per input symbol.
    pub output: Word,
}

impl CommandOutput for QueryOutput {
    fn to_human(&self) -> String {
        let mut table = table(&["#", "INPUT", "OUTPUT"]);
        for (idx, (input, output)) in self.input.iter().zip(&self.output).enumerate() {
            table.add_row(vec![(idx + 1).to_string(), input.clone(), output.clone()]);
        }
        table.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run `query`.
pub async fn execute(args: QueryArgs, json_mode: bool) -> Result<()> {
    let target = load_target(&args.target)?;
    let alphabet = target_alphabet(&target, &[])?;
    // reading outputs never touches stored results
    let registry = RunRegistry::new(
        Arc::new(InMemoryLearnerResultRepository::new()),
        Arc::new(ScriptedConnectorFactory::new(target)),
        Arc::new(StrategyRegistry::new()),
    );

    let input = parse_word(&args.word);
    let output_word = registry
        .read_outputs(args.project, &alphabet, &input)
        .await
        .context("Failed to read outputs")?;
    output(
        &QueryOutput {
            input,
            output: output_word,
        },
        json_mode,
    );
    Ok(())
}
