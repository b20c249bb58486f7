//! Learner results and their steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

use super::alphabet::Alphabet;
use super::hypothesis::Hypothesis;
use super::run_config::{EqOracleConfig, ProjectId, RunConfig, StepBudget, TestNo, UserId};
use super::statistics::Statistics;
use super::word::CounterExampleQuery;

/// One learn-then-search iteration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position inside the result.
    pub step_no: u32,
    /// Hypothesis learned in this step.
    pub hypothesis: Option<Hypothesis>,
    /// Counterexample found while searching from `hypothesis`; `None` means convergence.
    pub counter_example: Option<CounterExampleQuery>,
    /// Costs of this step alone.
    pub statistics: Statistics,
    /// Set only when the step failed.
    pub error_text: Option<String>,
    /// Learner-specific dump, such as the observation table.
    #[serde(default)]
    pub algorithm_information: String,
    /// Oracle this step searched with.
    pub eq_oracle: EqOracleConfig,
    /// Budget of the invocation that ran this step.
    pub step_budget: StepBudget,
}

impl Step {
    /// An empty step started now.
    pub fn new(step_no: u32, eq_oracle: EqOracleConfig, step_budget: StepBudget) -> Self {
        Self {
            step_no,
            hypothesis: None,
            counter_example: None,
            statistics: Statistics::started_now(),
            error_text: None,
            algorithm_information: String::new(),
            eq_oracle,
            step_budget,
        }
    }

    /// Whether the step recorded an error.
    pub fn is_error(&self) -> bool {
        self.error_text.is_some()
    }
}

/// Root aggregate of a single learning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerResult {
    /// Owning project.
    pub project_id: ProjectId,
    /// Per-project number, assigned on creation.
    pub test_no: TestNo,
    /// User who started the run.
    pub user_id: UserId,
    /// Configuration the run was started with.
    pub config: RunConfig,
    /// Alphabet the run learns over.
    pub alphabet: Alphabet,
    /// Steps in `step_no` order.
    pub steps: Vec<Step>,
    /// Hypothesis of the most recent step that produced one.
    pub hypothesis: Option<Hypothesis>,
    /// Sum over all steps.
    pub statistics: Statistics,
    /// When the result was created.
    pub created_at: DateTime<Utc>,
}

impl LearnerResult {
    /// A result without steps; the test number is assigned by the repository.
    pub fn new(config: RunConfig) -> Self {
        Self {
            project_id: config.project_id,
            test_no: 0,
            user_id: config.user_id,
            alphabet: config.alphabet.clone(),
            config,
            steps: Vec::new(),
            hypothesis: None,
            statistics: Statistics::default(),
            created_at: Utc::now(),
        }
    }

    /// The most recent step, failed or not.
    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Number the next appended step will carry.
    pub fn next_step_no(&self) -> u32 {
        self.steps.last().map_or(1, |s| s.step_no + 1)
    }

    /// Append a new step or replace the step with the same number.
    ///
    /// Appending must continue the 1, 2, 3, ... sequence.
    pub fn upsert_step(&mut self, step: Step) -> DomainResult<()> {
        if let Some(existing) = self.steps.iter_mut().find(|s| s.step_no == step.step_no) {
            *existing = step;
        } else if step.step_no == self.next_step_no() {
            self.steps.push(step);
        } else {
            return Err(DomainError::ValidationFailed(format!(
                "step {} would leave a gap after step {}",
                step.step_no,
                self.next_step_no() - 1
            )));
        }
        self.refresh_summary();
        Ok(())
    }

    /// Recompute the latest hypothesis and the aggregate statistics.
    pub fn refresh_summary(&mut self) {
        self.hypothesis = self
            .steps
            .iter()
            .rev()
            .find_map(|s| s.hypothesis.clone());
        self.statistics = Statistics::aggregate(self.steps.iter().map(|s| &s.statistics));
    }

    /// Counterexamples of all steps, in step order.
    pub fn counter_examples(&self) -> impl Iterator<Item = &CounterExampleQuery> {
        self.steps.iter().filter_map(|s| s.counter_example.as_ref())
    }

    /// Whether any step ended with an error.
    pub fn has_error(&self) -> bool {
        self.steps.iter().any(Step::is_error)
    }
}
