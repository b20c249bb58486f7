//! Configuration of a learning run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{DomainError, DomainResult};

use super::alphabet::Alphabet;
use super::word::Word;

/// Identifier of the project owning a SUL.
pub type ProjectId = i64;
/// Identifier of the user who started a run.
pub type UserId = i64;
/// Per-project sequence number of a learner result, starting at 1.
pub type TestNo = i64;

const MAX_COMMENT_LENGTH: usize = 255;

/// Learning algorithms shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningAlgorithmKind {
    /// Observation-table learner for Mealy machines.
    #[default]
    Lstar,
    /// Direct hypothesis construction.
    Dhc,
}

impl LearningAlgorithmKind {
    /// Stable name used in configs and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lstar => "lstar",
            Self::Dhc => "dhc",
        }
    }

    /// Every registered algorithm, in display order.
    pub fn all() -> &'static [Self] {
        &[Self::Lstar, Self::Dhc]
    }
}

impl fmt::Display for LearningAlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningAlgorithmKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lstar" | "l*" => Ok(Self::Lstar),
            "dhc" => Ok(Self::Dhc),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown learning algorithm '{other}'"
            ))),
        }
    }
}

/// Equivalence oracle selection together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EqOracleConfig {
    /// Random words with lengths in `min_length..=max_length`.
    RandomWord {
        /// Shortest word length.
        min_length: usize,
        /// Longest word length.
        max_length: usize,
        /// Words tested per search.
        max_no_of_tests: usize,
        /// Seed of the word generator.
        #[serde(default = "default_seed")]
        seed: u64,
    },
    /// Every word with length in `min_depth..=max_depth`, shortest first.
    Complete {
        /// Shortest word length tested.
        min_depth: usize,
        /// Longest word length tested.
        max_depth: usize,
    },
    /// A fixed list of words supplied by the user.
    Sample {
        /// Candidate words, tested in order.
        counter_examples: Vec<Word>,
    },
}

const fn default_seed() -> u64 {
    42
}

impl Default for EqOracleConfig {
    fn default() -> Self {
        Self::RandomWord {
            min_length: 1,
            max_length: 10,
            max_no_of_tests: 20,
            seed: default_seed(),
        }
    }
}

impl EqOracleConfig {
    /// Strategy name as accepted by the factory.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RandomWord { .. } => "random_word",
            Self::Complete { .. } => "complete",
            Self::Sample { .. } => "sample",
        }
    }

    /// Parameter checks that do not need the alphabet.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            Self::RandomWord {
                min_length,
                max_length,
                max_no_of_tests,
                ..
            } => {
                if min_length > max_length {
                    return Err(DomainError::ValidationFailed(format!(
                        "random_word: min_length ({min_length}) exceeds max_length ({max_length})"
                    )));
                }
                if *max_length == 0 {
                    return Err(DomainError::ValidationFailed(
                        "random_word: max_length must be positive".to_string(),
                    ));
                }
                if *max_no_of_tests == 0 {
                    return Err(DomainError::ValidationFailed(
                        "random_word: max_no_of_tests must be positive".to_string(),
                    ));
                }
            }
            Self::Complete {
                min_depth,
                max_depth,
            } => {
                if min_depth > max_depth {
                    return Err(DomainError::ValidationFailed(format!(
                        "complete: min_depth ({min_depth}) exceeds max_depth ({max_depth})"
                    )));
                }
            }
            Self::Sample { counter_examples } => {
                if counter_examples.iter().any(Vec::is_empty) {
                    return Err(DomainError::ValidationFailed(
                        "sample: words must not be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Number of steps a run may perform.
///
/// `-1` is unbounded, `0` is none, a positive value is an exact cap.
/// The first step always runs; `0` and `1` both stop after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepBudget(i64);

impl StepBudget {
    /// Run until convergence.
    pub const UNBOUNDED: Self = Self(-1);

    /// Fails for values below `-1`.
    pub fn new(value: i64) -> DomainResult<Self> {
        if value < -1 {
            return Err(DomainError::ValidationFailed(format!(
                "step budget must be -1 (unbounded) or non-negative, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Raw value: `-1`, `0` or a cap.
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Whether this is `-1`.
    pub const fn is_unbounded(&self) -> bool {
        self.0 == -1
    }

    /// Whether `performed` steps exhaust the budget.
    pub const fn is_exhausted(&self, performed: i64) -> bool {
        !self.is_unbounded() && performed >= self.0
    }
}

impl Default for StepBudget {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

const fn default_true() -> bool {
    true
}

/// Everything needed to start a learning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Owning project.
    pub project_id: ProjectId,
    /// User who started the run.
    pub user_id: UserId,
    /// Learner strategy.
    #[serde(default)]
    pub algorithm: LearningAlgorithmKind,
    /// Oracle used by the first step.
    #[serde(default)]
    pub eq_oracle: EqOracleConfig,
    /// Steps allowed in the first invocation.
    #[serde(default)]
    pub max_steps: StepBudget,
    /// Wrap the SUL in a membership-query cache.
    #[serde(default = "default_true")]
    pub use_mq_cache: bool,
    /// Input symbols plus the reset symbol.
    pub alphabet: Alphabet,
    /// Free text, at most 2048 characters.
    #[serde(default)]
    pub comment: String,
}

impl RunConfig {
    /// Defaults: L*, a random-word oracle and an unbounded budget.
    pub fn new(project_id: ProjectId, user_id: UserId, alphabet: Alphabet) -> Self {
        Self {
            project_id,
            user_id,
            algorithm: LearningAlgorithmKind::default(),
            eq_oracle: EqOracleConfig::default(),
            max_steps: StepBudget::default(),
            use_mq_cache: true,
            alphabet,
            comment: String::new(),
        }
    }

    /// Select the learner.
    pub fn with_algorithm(mut self, algorithm: LearningAlgorithmKind) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Select the oracle for the first step.
    pub fn with_eq_oracle(mut self, eq_oracle: EqOracleConfig) -> Self {
        self.eq_oracle = eq_oracle;
        self
    }

    /// Set the step budget.
    pub fn with_max_steps(mut self, max_steps: StepBudget) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Enable or disable the membership-query cache.
    pub fn with_mq_cache(mut self, enabled: bool) -> Self {
        self.use_mq_cache = enabled;
        self
    }

    /// Attach a comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Checks alphabet, oracle, budget and comment length.
    pub fn validate(&self) -> DomainResult<()> {
        self.alphabet.validate()?;
        self.eq_oracle.validate()?;
        validate_budget(self.max_steps)?;
        if self.comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(DomainError::ValidationFailed(format!(
                "comment exceeds {MAX_COMMENT_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Partial configuration used to resume a halted result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeConfig {
    /// Budget for this invocation only.
    #[serde(default)]
    pub max_steps: StepBudget,
    /// Replacement oracle; the previous step's oracle is reused when absent.
    #[serde(default)]
    pub eq_oracle: Option<EqOracleConfig>,
}

impl ResumeConfig {
    /// Resume with the previous oracle.
    pub fn new(max_steps: StepBudget) -> Self {
        Self {
            max_steps,
            eq_oracle: None,
        }
    }

    /// Replace the oracle for the resumed steps.
    pub fn with_eq_oracle(mut self, eq_oracle: EqOracleConfig) -> Self {
        self.eq_oracle = Some(eq_oracle);
        self
    }

    /// Checks the budget and any replacement oracle.
    pub fn validate(&self) -> DomainResult<()> {
        validate_budget(self.max_steps)?;
        if let Some(oracle) = &self.eq_oracle {
            oracle.validate()?;
        }
        Ok(())
    }
}

// deserialized budgets bypass `StepBudget::new`
fn validate_budget(budget: StepBudget) -> DomainResult<()> {
    if budget.value() < -1 {
        return Err(DomainError::ValidationFailed(format!(
            "step budget must be -1 (unbounded) or non-negative, got {}",
            budget.value()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet() -> Alphabet {
        Alphabet::new(["a", "b"], "reset").unwrap()
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!("lstar".parse::<LearningAlgorithmKind>().unwrap(), LearningAlgorithmKind::Lstar);
        assert_eq!("DHC".parse::<LearningAlgorithmKind>().unwrap(), LearningAlgorithmKind::Dhc);
        assert!(matches!(
            "ttt".parse::<LearningAlgorithmKind>(),
            Err(DomainError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_budget_semantics() {
        assert!(StepBudget::UNBOUNDED.is_unbounded());
        assert!(!StepBudget::UNBOUNDED.is_exhausted(1_000));
        let three = StepBudget::new(3).unwrap();
        assert!(!three.is_exhausted(2));
        assert!(three.is_exhausted(3));
        assert!(StepBudget::new(0).unwrap().is_exhausted(1));
        assert!(StepBudget::new(-2).is_err());
    }

    #[test]
    fn test_run_config_validation() {
        let config = RunConfig::new(1, 1, alphabet());
        assert!(config.validate().is_ok());

        let zero = config.clone().with_max_steps(StepBudget::new(0).unwrap());
        assert!(zero.validate().is_ok());
        let below = config.clone().with_max_steps(StepBudget(-2));
        assert!(below.validate().is_err());

        let bad_oracle = config.clone().with_eq_oracle(EqOracleConfig::Complete {
            min_depth: 3,
            max_depth: 1,
        });
        assert!(bad_oracle.validate().is_err());

        let long_comment = config.with_comment("x".repeat(256));
        assert!(long_comment.validate().is_err());
    }

    #[test]
    fn test_eq_oracle_yaml() {
        let yaml = "type: random_word\nmin_length: 1\nmax_length: 5\nmax_no_of_tests: 50\n";
        let oracle: EqOracleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            oracle,
            EqOracleConfig::RandomWord {
                min_length: 1,
                max_length: 5,
                max_no_of_tests: 50,
                seed: 42
            }
        );
        assert_eq!(oracle.name(), "random_word");
    }
}
