//! Equivalence oracle port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alphabet, CounterExampleQuery, Hypothesis};

use super::membership_oracle::MembershipOracle;

/// Searches for inputs on which a hypothesis and the SUL disagree.
///
/// `None` means nothing was found within the strategy's search budget, not
/// that the hypothesis is proven correct.
#[async_trait]
pub trait EquivalenceOracle: Send + Sync {
    /// Strategy name, as in `EqOracleConfig::name`.
    fn name(&self) -> &'static str;

    /// Search for a word on which `hypothesis` and the SUL differ.
    async fn find_counter_example(
        &mut self,
        oracle: &mut dyn MembershipOracle,
        hypothesis: &Hypothesis,
        alphabet: &Alphabet,
    ) -> DomainResult<Option<CounterExampleQuery>>;
}
