//! Stored learner result CLI commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::adapters::connectors::MealyTarget;
use crate::cli::output::{hypothesis_table, output, steps_table, table, truncate, CommandOutput};
use crate::domain::models::{Config, LearnerResult, ProjectId, TestNo};
use crate::domain::ports::LearnerResultRepository;

use super::open_repository;

/// Inspect, export and delete stored learner results
#[derive(Args, Debug)]
pub struct ResultsArgs {
    /// Action to perform.
    #[command(subcommand)]
    pub command: ResultsCommands,
}

/// Subcommands of `results`.
#[derive(Subcommand, Debug)]
pub enum ResultsCommands {
    /// List the results of a project
    List {
        /// Project ID
        #[arg(short, long, default_value = "1")]
        project: ProjectId,
    },
    /// Show the steps and final hypothesis of a result
    Show {
        /// Project ID
        #[arg(short, long, default_value = "1")]
        project: ProjectId,
        /// Test number; the latest result when omitted
        #[arg(short, long)]
        test_no: Option<TestNo>,
        /// Include the learner's internal data of the last step
        #[arg(long)]
        diagnostics: bool,
    },
    /// Write a hypothesis as a target YAML file
    Export {
        /// Project ID
        #[arg(short, long, default_value = "1")]
        project: ProjectId,
        /// Test number; the latest result when omitted
        #[arg(short, long)]
        test_no: Option<TestNo>,
        /// Step whose hypothesis is exported; the final hypothesis when omitted
        #[arg(short, long)]
        step: Option<u32>,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete results
    Delete {
        /// Project ID
        #[arg(short, long, default_value = "1")]
        project: ProjectId,
        /// Test numbers to delete
        #[arg(required = true)]
        test_nos: Vec<TestNo>,
    },
}

/// One row of `results list`.
#[derive(Debug, Serialize)]
pub struct ResultSummary {
    /// Per-project test number.
    pub test_no: TestNo,
    /// Learner name.
    pub algorithm: String,
    /// Oracle of the last step.
    pub eq_oracle: String,
    /// Number of steps.
    pub steps: usize,
    /// States of the final hypothesis.
    pub states: Option<usize>,
    /// Membership queries over all steps.
    pub mqs: u64,
    /// Equivalence queries over all steps.
    pub eqs: u64,
    /// Whether the last step found no counterexample.
    pub converged: bool,
    /// Whether any step recorded an error.
    pub failed: bool,
    /// Run comment.
    pub comment: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<&LearnerResult> for ResultSummary {
    fn from(result: &LearnerResult) -> Self {
        let last = result.last_step();
        Self {
            test_no: result.test_no,
            algorithm: result.config.algorithm.to_string(),
            eq_oracle: last
                .map_or(result.config.eq_oracle.name(), |s| s.eq_oracle.name())
                .to_string(),
            steps: result.steps.len(),
            states: result.hypothesis.as_ref().map(|h| h.size()),
            mqs: result.statistics.mqs_used.total(),
            eqs: result.statistics.eqs_used,
            converged: last.is_some_and(|s| {
                !s.is_error() && s.statistics.eqs_used > 0 && s.counter_example.is_none()
            }),
            failed: result.has_error(),
            comment: result.config.comment.clone(),
            created_at: result.created_at.to_rfc3339(),
        }
    }
}

/// Outcome of `results list`.
#[derive(Debug, Serialize)]
pub struct ResultListOutput {
    /// Project listed.
    pub project_id: ProjectId,
    /// Oldest first.
    pub results: Vec<ResultSummary>,
}

impl CommandOutput for ResultListOutput {
    fn to_human(&self) -> String {
        if self.results.is_empty() {
            return format!("No results for project {}.", self.project_id);
        }

        let mut table = table(&[
            "TEST", "ALGORITHM", "ORACLE", "STEPS", "STATES", "MQS", "EQS", "STATE", "COMMENT",
        ]);
        for result in &self.results {
            let state = if result.failed {
                "failed"
            } else if result.converged {
                "converged"
            } else {
                "halted"
            };
            table.add_row(vec![
                result.test_no.to_string(),
                result.algorithm.clone(),
                result.eq_oracle.clone(),
                result.steps.to_string(),
                result.states.map_or_else(|| "-".to_string(), |s| s.to_string()),
                result.mqs.to_string(),
                result.eqs.to_string(),
                state.to_string(),
                truncate(&result.comment, 30),
            ]);
        }
        format!(
            "Found {} result(s) for project {}:\n{table}",
            self.results.len(),
            self.project_id
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Outcome of `results show`.
#[derive(Debug, Serialize)]
pub struct ResultDetailOutput {
    /// The stored result.
    pub result: LearnerResult,
    /// Learner internals of the last step, when requested.
    pub diagnostics: Option<String>,
}

impl CommandOutput for ResultDetailOutput {
    fn to_human(&self) -> String {
        let result = &self.result;
        let mut lines = vec![
            format!("Result {} of project {}", result.test_no, result.project_id),
            format!("Algorithm: {}", result.config.algorithm),
            format!("Alphabet: {}", result.alphabet.symbols().join(", ")),
            format!("Created: {}", result.created_at.to_rfc3339()),
        ];
        if !result.config.comment.is_empty() {
            lines.push(format!("Comment: {}", result.config.comment));
        }
        lines.push(steps_table(&result.steps).to_string());
        if let Some(hypothesis) = &result.hypothesis {
            lines.push(format!("Hypothesis ({} states):", hypothesis.size()));
            lines.push(hypothesis_table(hypothesis).to_string());
        }
        if let Some(diagnostics) = &self.diagnostics {
            lines.push("Learner data of the last step:".to_string());
            lines.push(diagnostics.clone());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Outcome of `results export` and `results delete`.
#[derive(Debug, Serialize)]
pub struct ResultActionOutput {
    /// Whether the action succeeded.
    pub success: bool,
    /// Summary for humans.
    pub message: String,
}

impl CommandOutput for ResultActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn find_result(
    repository: &dyn LearnerResultRepository,
    project: ProjectId,
    test_no: Option<TestNo>,
) -> Result<LearnerResult> {
    let result = match test_no {
        Some(test_no) => repository.get(project, test_no).await?,
        None => repository.get_latest(project).await?,
    };
    result.ok_or_else(|| match test_no {
        Some(test_no) => anyhow!("Result {test_no} of project {project} not found"),
        None => anyhow!("Project {project} has no results"),
    })
}

/// Run a `results` subcommand.
pub async fn execute(args: ResultsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let repository = open_repository(config).await?;

    match args.command {
        ResultsCommands::List { project } => {
            let results = repository.list(project).await?;
            let out = ResultListOutput {
                project_id: project,
                results: results.iter().map(ResultSummary::from).collect(),
            };
            output(&out, json_mode);
        }
        ResultsCommands::Show {
            project,
            test_no,
            diagnostics,
        } => {
            let result = find_result(repository.as_ref(), project, test_no).await?;
            let diagnostics = diagnostics
                .then(|| result.last_step().map(|s| s.algorithm_information.clone()))
                .flatten()
                .filter(|text| !text.is_empty());
            output(&ResultDetailOutput { result, diagnostics }, json_mode);
        }
        ResultsCommands::Export {
            project,
            test_no,
            step,
            output: path,
        } => {
            let result = find_result(repository.as_ref(), project, test_no).await?;
            let hypothesis = match step {
                Some(step_no) => result
                    .steps
                    .iter()
                    .find(|s| s.step_no == step_no)
                    .and_then(|s| s.hypothesis.as_ref()),
                None => result.hypothesis.as_ref(),
            }
            .ok_or_else(|| anyhow!("Result {} has no such hypothesis", result.test_no))?;

            let target = MealyTarget::from_hypothesis(hypothesis, result.alphabet.reset_symbol());
            std::fs::write(&path, target.to_yaml_string()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let out = ResultActionOutput {
                success: true,
                message: format!(
                    "Wrote {} state hypothesis of result {} to {}",
                    hypothesis.size(),
                    result.test_no,
                    path.display()
                ),
            };
            output(&out, json_mode);
        }
        ResultsCommands::Delete { project, test_nos } => {
            let removed = repository.delete(project, &test_nos).await?;
            let out = ResultActionOutput {
                success: removed > 0,
                message: format!("Deleted {removed} result(s) of project {project}"),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
