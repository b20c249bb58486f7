//! Learning algorithm port.

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CounterExampleQuery, Hypothesis, LearningAlgorithmKind};

use super::membership_oracle::MembershipOracle;

/// A learner that builds Mealy hypotheses from membership queries.
#[async_trait]
pub trait LearningAlgorithm: Send + Sync {
    /// Which registered algorithm this is.
    fn kind(&self) -> LearningAlgorithmKind;

    /// Produce the first hypothesis.
    async fn start_learning(&mut self, oracle: &mut dyn MembershipOracle)
        -> DomainResult<Hypothesis>;

    /// Incorporate a counterexample and return the refined hypothesis.
    ///
    /// Fails if the current hypothesis already agrees with the counterexample.
    async fn refine_hypothesis(
        &mut self,
        oracle: &mut dyn MembershipOracle,
        counter_example: &CounterExampleQuery,
    ) -> DomainResult<Hypothesis>;

    /// Current hypothesis, if learning has started.
    fn hypothesis(&self) -> Option<&Hypothesis>;

    /// Human-readable dump of the learner's internal data structures.
    fn internal_diagnostics(&self) -> DomainResult<String> {
        Err(DomainError::Algorithm(format!(
            "{} does not expose internal data",
            self.kind()
        )))
    }
}
