//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::compare::CompareArgs;
use super::commands::init::InitArgs;
use super::commands::learn::LearnArgs;
use super::commands::query::QueryArgs;
use super::commands::results::ResultsArgs;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "statelearner")]
#[command(about = "Active automata learning against black-box systems", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file replacing .statelearner/config.yaml
    #[arg(short, long, global = true, env = "STATELEARNER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the .statelearner directory, default config and database
    Init(InitArgs),

    /// Learn a model of a scripted target, or resume a stored result
    Learn(LearnArgs),

    /// Inspect, export and delete stored learner results
    Results(ResultsArgs),

    /// Run one input word against a target and print the outputs
    Query(QueryArgs),

    /// Find a word on which two machines differ
    Compare(CompareArgs),
}
