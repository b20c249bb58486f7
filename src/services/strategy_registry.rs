//! Strategy registry and factory.

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alphabet, EqOracleConfig, LearningAlgorithmKind};
use crate::domain::ports::{EquivalenceOracle, LearningAlgorithm, StrategyFactory};

use super::{algorithms, oracles};

/// Registry of the shipped learning algorithms and equivalence oracles.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry;

impl StrategyRegistry {
    /// Registry of the shipped strategies.
    pub fn new() -> Self {
        Self
    }

    /// Names accepted for learning algorithms.
    pub fn available_algorithms(&self) -> Vec<&'static str> {
        LearningAlgorithmKind::all()
            .iter()
            .map(LearningAlgorithmKind::as_str)
            .collect()
    }

    /// Names accepted for equivalence oracles.
    pub fn available_oracles(&self) -> Vec<&'static str> {
        vec!["random_word", "complete", "sample"]
    }
}

impl StrategyFactory for StrategyRegistry {
    fn create_learning_algorithm(
        &self,
        kind: LearningAlgorithmKind,
        alphabet: &Alphabet,
    ) -> DomainResult<Box<dyn LearningAlgorithm>> {
        alphabet.validate()?;
        Ok(algorithms::create(kind, alphabet))
    }

    fn create_equivalence_oracle(
        &self,
        config: &EqOracleConfig,
        alphabet: &Alphabet,
    ) -> DomainResult<Box<dyn EquivalenceOracle>> {
        oracles::create(config, alphabet)
    }
}
