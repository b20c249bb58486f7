//! Learning data model.

pub mod alphabet;
pub mod config;
pub mod hypothesis;
pub mod learner_result;
pub mod run_config;
pub mod run_status;
pub mod statistics;
pub mod word;

pub use alphabet::Alphabet;
pub use config::{Config, DatabaseConfig, LearnerConfig, LoggingConfig, ResumeCachePolicy};
pub use hypothesis::{Hypothesis, Transition};
pub use learner_result::{LearnerResult, Step};
pub use run_config::{
    EqOracleConfig, LearningAlgorithmKind, ProjectId, ResumeConfig, RunConfig, StepBudget, TestNo,
    UserId,
};
pub use run_status::{RunOutcome, RunPhase, RunStatus};
pub use statistics::{DetailedStatistics, Statistics};
pub use word::{render_word, CounterExampleQuery, Word};
