//! Run lifecycle phases and status snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::learner_result::LearnerResult;
use super::run_config::TestNo;

/// Phase of the step controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Admitted, nothing executed yet.
    Init,
    /// Building the first hypothesis.
    LearningFirst,
    /// The equivalence oracle is running.
    SearchingCounterexample,
    /// Feeding a counterexample back to the learner.
    Refining,
    /// The oracle found no counterexample.
    Converged,
    /// Stopped after the last budgeted step.
    BudgetExhausted,
    /// Stopped on request between phases.
    Cancelled,
    /// A step recorded an error.
    Failed,
}

impl RunPhase {
    /// Whether the run can no longer make progress.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Converged | Self::BudgetExhausted | Self::Cancelled | Self::Failed
        )
    }

    /// Snake-case name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::LearningFirst => "learning_first",
            Self::SearchingCounterexample => "searching_counterexample",
            Self::Refining => "refining",
            Self::Converged => "converged",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Result the run worked on.
    pub test_no: TestNo,
    /// Always a terminal phase.
    pub phase: RunPhase,
    /// Steps executed by this invocation only.
    pub steps_performed: u32,
    /// Error text of the failing step.
    pub error: Option<String>,
}

impl RunOutcome {
    /// Whether the run ended in `Converged`.
    pub fn is_converged(&self) -> bool {
        self.phase == RunPhase::Converged
    }
}

/// Status of a project as seen by the run registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing running; carries the outcome of the last run in this process, if any.
    Idle {
        /// Outcome of the most recent run, if one finished.
        last_outcome: Option<RunOutcome>,
    },
    /// A run is executing; `result` is its latest snapshot.
    Active {
        /// Phase the run is in.
        phase: RunPhase,
        /// Snapshot published with the last phase change.
        result: Box<LearnerResult>,
    },
}

impl RunStatus {
    /// Whether a run is executing.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Current phase, or the phase of the last outcome when idle.
    pub fn phase(&self) -> Option<RunPhase> {
        match self {
            Self::Active { phase, .. } => Some(*phase),
            Self::Idle { last_outcome } => last_outcome.as_ref().map(|o| o.phase),
        }
    }
}
