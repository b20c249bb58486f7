//! Exhaustive search over all words within a length range.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alphabet, CounterExampleQuery, Hypothesis};
use crate::domain::ports::{EquivalenceOracle, MembershipOracle};

use super::check_word;

/// Tests every word with length in `min_depth..=max_depth`, shortest first.
pub struct CompleteOracle {
    min_depth: usize,
    max_depth: usize,
}

impl CompleteOracle {
    /// A `min_depth` below 1 is raised to 1.
    pub fn new(min_depth: usize, max_depth: usize) -> Self {
        Self {
            min_depth: min_depth.max(1),
            max_depth,
        }
    }
}

#[async_trait]
impl EquivalenceOracle for CompleteOracle {
    fn name(&self) -> &'static str {
        "complete"
    }

    async fn find_counter_example(
        &mut self,
        oracle: &mut dyn MembershipOracle,
        hypothesis: &Hypothesis,
        alphabet: &Alphabet,
    ) -> DomainResult<Option<CounterExampleQuery>> {
        let symbols = alphabet.symbols();
        for depth in self.min_depth..=self.max_depth {
            // odometer over symbol indices, last position fastest
            let mut digits = vec![0usize; depth];
            loop {
                let word = digits.iter().map(|&i| symbols[i].clone()).collect();
                if let Some(found) = check_word(oracle, hypothesis, word).await? {
                    return Ok(Some(found));
                }

                let Some(pos) = digits.iter().rposition(|&d| d + 1 < symbols.len()) else {
                    break;
                };
                digits[pos] += 1;
                for digit in &mut digits[pos + 1..] {
                    *digit = 0;
                }
            }
        }
        Ok(None)
    }
}
