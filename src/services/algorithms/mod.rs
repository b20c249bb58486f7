//! Learning algorithm implementations.

pub mod dhc;
pub mod lstar;

pub use dhc::Dhc;
pub use lstar::LStar;

use crate::domain::models::{Alphabet, CounterExampleQuery, Hypothesis, LearningAlgorithmKind};
use crate::domain::ports::LearningAlgorithm;

/// Create a fresh learner of the given kind.
pub fn create(kind: LearningAlgorithmKind, alphabet: &Alphabet) -> Box<dyn LearningAlgorithm> {
    match kind {
        LearningAlgorithmKind::Lstar => Box::new(LStar::new(alphabet)),
        LearningAlgorithmKind::Dhc => Box::new(Dhc::new(alphabet)),
    }
}

/// Whether the hypothesis predicts something other than the observed output.
pub(crate) fn contradicts(hypothesis: &Hypothesis, counter_example: &CounterExampleQuery) -> bool {
    hypothesis
        .suffix_output(&counter_example.prefix, &counter_example.suffix)
        .as_ref()
        != Some(&counter_example.output)
}
