//! Cost accounting for learning steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// A value split into the learner phase and the equivalence-oracle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedStatistics {
    /// Spent while learning or refining.
    pub learner: u64,
    /// Spent while searching for counterexamples.
    pub eq_oracle: u64,
}

impl DetailedStatistics {
    /// Split value from its two phases.
    pub const fn new(learner: u64, eq_oracle: u64) -> Self {
        Self { learner, eq_oracle }
    }

    /// Both phases together.
    pub const fn total(&self) -> u64 {
        self.learner + self.eq_oracle
    }
}

impl AddAssign for DetailedStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.learner += rhs.learner;
        self.eq_oracle += rhs.eq_oracle;
    }
}

/// Statistics of one step, or the sum over all steps of a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// When the step (or the first step of a result) started.
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: DetailedStatistics,
    /// Membership queries (resets) sent to the SUL.
    pub mqs_used: DetailedStatistics,
    /// Symbols executed on the SUL.
    pub symbols_used: DetailedStatistics,
    /// Equivalence queries issued.
    pub eqs_used: u64,
}

impl Statistics {
    /// Fresh statistics stamped with the current time.
    pub fn started_now() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Sum a sequence of per-step statistics; keeps the earliest start time.
    pub fn aggregate<'a>(steps: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut total = Self::default();
        for stats in steps {
            total.duration_ms += stats.duration_ms;
            total.mqs_used += stats.mqs_used;
            total.symbols_used += stats.symbols_used;
            total.eqs_used += stats.eqs_used;
            total.started_at = match (total.started_at, stats.started_at) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        total
    }
}
