//! Implementation of the `statelearner learn` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::connectors::ScriptedConnectorFactory;
use crate::application::{RunHandle, RunRegistry};
use crate::cli::output::{hypothesis_table, output, steps_table, CommandOutput};
use crate::domain::models::{
    Config, EqOracleConfig, Hypothesis, LearnerResult, LearningAlgorithmKind, ProjectId, ResumeConfig,
    RunConfig, RunOutcome, Step, StepBudget, TestNo, UserId,
};
use crate::services::StrategyRegistry;

use super::{load_target, open_repository, parse_word, target_alphabet};

/// Learn a model of a scripted target, or resume a stored result
#[derive(Args, Debug)]
pub struct LearnArgs {
    /// YAML file describing the target machine
    #[arg(short, long)]
    pub target: PathBuf,

    /// Project the result belongs to
    #[arg(short, long, default_value = "1")]
    pub project: ProjectId,

    /// User starting the run
    #[arg(short, long, default_value = "1")]
    pub user: UserId,

    /// Input symbols (comma-separated); all target symbols when omitted
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Learning algorithm (lstar, dhc); configured default when omitted
    #[arg(short, long)]
    pub algorithm: Option<String>,

    /// Equivalence oracle (random_word, complete, sample)
    #[arg(short, long)]
    pub eq_oracle: Option<String>,

    /// Shortest random word
    #[arg(long, default_value = "1")]
    pub min_length: usize,

    /// Longest random word
    #[arg(long, default_value = "10")]
    pub max_length: usize,

    /// Random words tried per equivalence query
    #[arg(long, default_value = "20")]
    pub tests: usize,

    /// Seed of the random word generator
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Shortest word the complete oracle enumerates
    #[arg(long, default_value = "1")]
    pub min_depth: usize,

    /// Longest word the complete oracle enumerates
    #[arg(long, default_value = "3")]
    pub max_depth: usize,

    /// Word for the sample oracle, symbols separated by spaces (repeatable)
    #[arg(long = "sample")]
    pub samples: Vec<String>,

    /// Steps to perform before pausing; -1 runs until convergence
    #[arg(short, long, allow_hyphen_values = true)]
    pub max_steps: Option<i64>,

    /// Send every membership query to the target
    #[arg(long)]
    pub no_cache: bool,

    /// Free text stored with the result
    #[arg(long)]
    pub comment: Option<String>,

    /// Continue the given test number instead of starting a new result
    #[arg(short, long)]
    pub resume: Option<TestNo>,
}

impl LearnArgs {
    fn eq_oracle_config(&self) -> Result<Option<EqOracleConfig>> {
        let Some(name) = self.eq_oracle.as_deref() else {
            return Ok(None);
        };
        let config = match name {
            "random_word" | "random" => EqOracleConfig::RandomWord {
                min_length: self.min_length,
                max_length: self.max_length,
                max_no_of_tests: self.tests,
                seed: self.seed,
            },
            "complete" => EqOracleConfig::Complete {
                min_depth: self.min_depth,
                max_depth: self.max_depth,
            },
            "sample" => EqOracleConfig::Sample {
                counter_examples: self.samples.iter().map(|s| parse_word(s)).collect(),
            },
            other => bail!("Unknown equivalence oracle '{other}'. Use random_word, complete or sample."),
        };
        Ok(Some(config))
    }

    fn step_budget(&self, default: StepBudget) -> Result<StepBudget> {
        match self.max_steps {
            Some(value) => Ok(StepBudget::new(value)?),
            None => Ok(default),
        }
    }
}

/// Outcome of `learn`.
#[derive(Debug, Serialize)]
pub struct LearnOutput {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Result as persisted when the run ended.
    pub result: LearnerResult,
}

impl CommandOutput for LearnOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Result {} of project {}: {} after {} step(s) in this run",
            self.outcome.test_no,
            self.result.project_id,
            self.outcome.phase,
            self.outcome.steps_performed
        )];
        if let Some(error) = &self.outcome.error {
            lines.push(format!("Error: {error}"));
        }
        lines.push(steps_table(&self.result.steps).to_string());
        if let Some(hypothesis) = &self.result.hypothesis {
            lines.push(format!("Hypothesis ({} states):", hypothesis.size()));
            lines.push(hypothesis_table(hypothesis).to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run `learn`, starting or resuming a run and waiting for it.
pub async fn execute(args: LearnArgs, config: &Config, json_mode: bool) -> Result<()> {
    let target = load_target(&args.target)?;
    let alphabet = target_alphabet(&target, &args.symbols)?;
    let repository = open_repository(config).await?;
    let registry = RunRegistry::new(
        repository,
        Arc::new(ScriptedConnectorFactory::new(target)),
        Arc::new(StrategyRegistry::new()),
    )
    .with_settings(config.learner.clone());

    let eq_oracle = args.eq_oracle_config()?;
    let budget = args.step_budget(config.learner.default_max_steps)?;
    let handle = match args.resume {
        Some(test_no) => {
            let mut resume = ResumeConfig::new(budget);
            if let Some(eq_oracle) = eq_oracle {
                resume = resume.with_eq_oracle(eq_oracle);
            }
            registry
                .resume(args.project, test_no, resume)
                .await
                .with_context(|| format!("Cannot resume result {test_no}"))?
        }
        None => {
            let algorithm = match args.algorithm.as_deref() {
                Some(name) => name.parse::<LearningAlgorithmKind>()?,
                None => config.learner.default_algorithm,
            };
            let mut run = RunConfig::new(args.project, args.user, alphabet)
                .with_algorithm(algorithm)
                .with_max_steps(budget)
                .with_mq_cache(config.learner.use_mq_cache && !args.no_cache);
            if let Some(eq_oracle) = eq_oracle {
                run = run.with_eq_oracle(eq_oracle);
            }
            if let Some(comment) = &args.comment {
                run = run.with_comment(comment.clone());
            }
            registry.start(run).await.context("Cannot start learning run")?
        }
    };

    let outcome = wait_or_stop(&registry, handle, json_mode).await?;
    let result = registry.result(args.project, outcome.test_no).await?;
    output(&LearnOutput { outcome, result }, json_mode);
    Ok(())
}

/// Wait for the run; Ctrl-C requests a stop after the current step.
async fn wait_or_stop(
    registry: &RunRegistry,
    mut handle: RunHandle,
    json_mode: bool,
) -> Result<RunOutcome> {
    let mut steps = handle.subscribe();
    let mut waiter = handle.clone();
    let mut reported = 0;

    loop {
        tokio::select! {
            outcome = waiter.wait() => return Ok(outcome?),
            _ = tokio::signal::ctrl_c() => {
                if !json_mode {
                    eprintln!("Stopping after the current step...");
                }
                registry.stop(handle.project_id()).await;
                return Ok(handle.wait().await?);
            }
            changed = steps.changed() => {
                if changed.is_err() {
                    return Ok(handle.wait().await?);
                }
                let finished: Vec<Step> = steps
                    .borrow_and_update()
                    .result
                    .steps
                    .iter()
                    .filter(|s| s.step_no > reported && s.statistics.eqs_used > 0)
                    .cloned()
                    .collect();
                for step in finished {
                    reported = step.step_no;
                    if !json_mode {
                        eprintln!(
                            "step {}: {} state(s), {}",
                            step.step_no,
                            step.hypothesis.as_ref().map_or(0, Hypothesis::size),
                            step.counter_example
                                .as_ref()
                                .map_or_else(|| "no counterexample".to_string(), |ce| format!("counterexample {ce}"))
                        );
                    }
                }
            }
        }
    }
}
