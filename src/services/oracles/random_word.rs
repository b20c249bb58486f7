//! Random-word equivalence oracle.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alphabet, CounterExampleQuery, Hypothesis, Word};
use crate::domain::ports::{EquivalenceOracle, MembershipOracle};

use super::check_word;

/// Tests a fixed number of random words against the hypothesis.
///
/// The generator is seeded once, so the sequence of words continues across
/// the searches of a run instead of repeating.
pub struct RandomWordOracle {
    min_length: usize,
    max_length: usize,
    max_no_of_tests: usize,
    rng: StdRng,
}

impl RandomWordOracle {
    /// Seeded oracle; equal seeds give equal word sequences.
    pub fn new(min_length: usize, max_length: usize, max_no_of_tests: usize, seed: u64) -> Self {
        Self {
            min_length,
            max_length,
            max_no_of_tests,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn next_word(&mut self, symbols: &[String]) -> Word {
        let length = self.rng.gen_range(self.min_length..=self.max_length);
        (0..length)
            .map(|_| symbols[self.rng.gen_range(0..symbols.len())].clone())
            .collect()
    }
}

#[async_trait]
impl EquivalenceOracle for RandomWordOracle {
    fn name(&self) -> &'static str {
        "random_word"
    }

    async fn find_counter_example(
        &mut self,
        oracle: &mut dyn MembershipOracle,
        hypothesis: &Hypothesis,
        alphabet: &Alphabet,
    ) -> DomainResult<Option<CounterExampleQuery>> {
        for test in 0..self.max_no_of_tests {
            let word = self.next_word(alphabet.symbols());
            if word.is_empty() {
                continue;
            }
            if let Some(found) = check_word(oracle, hypothesis, word).await? {
                debug!(test, "random word oracle found counterexample");
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

    fn single_state() -> Hypothesis {
        Hypothesis::from_edges(&["a", "b"], 0, &[(0, "a", "ok", 0), (0, "b", "s0", 0)]).unwrap()
    }

    fn toggle() -> Hypothesis {
        Hypothesis::from_edges(
            &["a", "b"],
            0,
            &[
                (0, "a", "ok", 1),
                (0, "b", "s0", 0),
                (1, "a", "ok", 0),
                (1, "b", "s1", 1),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_finds_difference() {
        let alphabet = Alphabet::new(["a", "b"], "reset").unwrap();
        let mut eq = RandomWordOracle::new(2, 6, 100, 7);
        let found = eq
            .find_counter_example(&mut toggle_oracle(), &single_state(), &alphabet)
            .await
            .unwrap()
            .expect("a difference exists");

        assert!(found.prefix.is_empty());
        assert!(found.suffix.len() >= 2);
        assert_ne!(single_state().output(&found.suffix), Some(found.output));
    }

    #[tokio::test]
    async fn test_respects_test_budget() {
        let alphabet = Alphabet::new(["a", "b"], "reset").unwrap();
        let mut oracle = toggle_oracle();
        let mut eq = RandomWordOracle::new(1, 5, 50, 42);

        let found = eq
            .find_counter_example(&mut oracle, &toggle(), &alphabet)
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(oracle.queries, 50);
        assert_eq!(toggle().output(&w("a")), Some(w("ok")));
    }
}
