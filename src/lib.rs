//! statelearner - active automata learning engine
//!
//! Learns a Mealy machine model of a black-box system under learning (SUL) by
//! alternating membership queries (run a word, observe outputs) with
//! equivalence queries (search for a counterexample to the current hypothesis).
//! Runs are persisted step by step and can be stopped and resumed.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Service Layer** (`services`): query execution, caching, learning algorithms
//!   and equivalence oracles
//! - **Application Layer** (`application`): the step controller and run registry
//! - **Adapters** (`adapters`): SQLite and in-memory result stores, scripted connectors
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use statelearner::adapters::connectors::{MealyTarget, ScriptedConnectorFactory};
//! use statelearner::adapters::memory::InMemoryLearnerResultRepository;
//! use statelearner::application::RunRegistry;
//! use statelearner::domain::models::RunConfig;
//! use statelearner::services::StrategyRegistry;
//!
//! # async fn demo(target: MealyTarget) -> anyhow::Result<()> {
//! let alphabet = target.alphabet()?;
//! let registry = RunRegistry::new(
//!     Arc::new(InMemoryLearnerResultRepository::new()),
//!     Arc::new(ScriptedConnectorFactory::new(target)),
//!     Arc::new(StrategyRegistry::new()),
//! );
//! let mut handle = registry.start(RunConfig::new(1, 1, alphabet)).await?;
//! let outcome = handle.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{CancellationToken, RunHandle, RunRegistry};
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Alphabet, Config, CounterExampleQuery, EqOracleConfig, Hypothesis, LearnerResult,
    LearningAlgorithmKind, ResumeConfig, RunConfig, RunOutcome, RunPhase, RunStatus, Step,
    StepBudget,
};
pub use domain::ports::{
    ConnectorFactory, EquivalenceOracle, LearnerResultRepository, LearningAlgorithm,
    MembershipOracle, StrategyFactory, SymbolConnector,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::StrategyRegistry;
