//! Name-keyed construction of learning strategies.

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alphabet, EqOracleConfig, LearningAlgorithmKind};

use super::equivalence_oracle::EquivalenceOracle;
use super::learning_algorithm::LearningAlgorithm;

/// Factory for the pluggable learning strategies.
pub trait StrategyFactory: Send + Sync {
    /// Create a fresh learner over `alphabet`.
    fn create_learning_algorithm(
        &self,
        kind: LearningAlgorithmKind,
        alphabet: &Alphabet,
    ) -> DomainResult<Box<dyn LearningAlgorithm>>;

    /// Fails with a validation error for bad parameters, including words
    /// with symbols outside `alphabet`.
    fn create_equivalence_oracle(
        &self,
        config: &EqOracleConfig,
        alphabet: &Alphabet,
    ) -> DomainResult<Box<dyn EquivalenceOracle>>;

    /// Create a learning algorithm from its configured name.
    fn create_learning_algorithm_by_name(
        &self,
        name: &str,
        alphabet: &Alphabet,
    ) -> DomainResult<Box<dyn LearningAlgorithm>> {
        self.create_learning_algorithm(name.parse()?, alphabet)
    }
}
