//! Equivalence oracle implementations.

pub mod complete;
pub mod random_word;
pub mod sample;

pub use complete::CompleteOracle;
pub use random_word::RandomWordOracle;
pub use sample::SampleOracle;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alphabet, CounterExampleQuery, EqOracleConfig, Hypothesis, Word};
use crate::domain::ports::{EquivalenceOracle, MembershipOracle};

/// Create an oracle after checking its parameters against the alphabet.
pub fn create(
    config: &EqOracleConfig,
    alphabet: &Alphabet,
) -> DomainResult<Box<dyn EquivalenceOracle>> {
    config.validate()?;
    Ok(match config {
        EqOracleConfig::RandomWord {
            min_length,
            max_length,
            max_no_of_tests,
            seed,
        } => Box::new(RandomWordOracle::new(
            *min_length,
            *max_length,
            *max_no_of_tests,
            *seed,
        )),
        EqOracleConfig::Complete {
            min_depth,
            max_depth,
        } => Box::new(CompleteOracle::new(*min_depth, *max_depth)),
        EqOracleConfig::Sample { counter_examples } => {
            for word in counter_examples {
                alphabet.check_word(word)?;
            }
            Box::new(SampleOracle::new(counter_examples.clone()))
        }
    })
}

/// Ask the SUL for `word` and report it if the hypothesis predicts otherwise.
pub(crate) async fn check_word(
    oracle: &mut dyn MembershipOracle,
    hypothesis: &Hypothesis,
    word: Word,
) -> DomainResult<Option<CounterExampleQuery>> {
    let output = oracle.answer(&word).await?;
    if hypothesis.output(&word).as_ref() == Some(&output) {
        return Ok(None);
    }
    Ok(Some(CounterExampleQuery::new(Vec::new(), word, output)))
}
