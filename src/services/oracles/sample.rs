//! Checks a fixed list of user-supplied words.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alphabet, CounterExampleQuery, Hypothesis, Word};
use crate::domain::ports::{EquivalenceOracle, MembershipOracle};

use super::check_word;

/// Checks a user-supplied list of words.
pub struct SampleOracle {
    words: Vec<Word>,
}

impl SampleOracle {
    /// Tests `words` in the given order.
    pub fn new(words: Vec<Word>) -> Self {
        Self { words }
    }
}

#[async_trait]
impl EquivalenceOracle for SampleOracle {
    fn name(&self) -> &'static str {
        "sample"
    }

    async fn find_counter_example(
        &mut self,
        oracle: &mut dyn MembershipOracle,
        hypothesis: &Hypothesis,
        _alphabet: &Alphabet,
    ) -> DomainResult<Option<CounterExampleQuery>> {
        for word in &self.words {
            if let Some(found) = check_word(oracle, hypothesis, word.clone()).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::algorithms::tests::{toggle_oracle, w};

    #[tokio::test]
    async fn test_returns_first_diverging_sample() {
        let alphabet = Alphabet::new(["a", "b"], "reset").unwrap();
        let single =
            Hypothesis::from_edges(&["a", "b"], 0, &[(0, "a", "ok", 0), (0, "b", "s0", 0)])
                .unwrap();

        let mut eq = SampleOracle::new(vec![w("b a"), w("a a b")]);
        let found = eq
            .find_counter_example(&mut toggle_oracle(), &single, &alphabet)
            .await
            .unwrap();
        assert_eq!(found.map(|ce| ce.suffix), None);

        let mut eq = SampleOracle::new(vec![w("b a"), w("a b")]);
        let found = eq
            .find_counter_example(&mut toggle_oracle(), &single, &alphabet)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.suffix, w("a b"));
    }
}
