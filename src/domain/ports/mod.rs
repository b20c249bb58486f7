//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces adapters and strategies implement:
//! - SymbolConnector: execution of input symbols on the system under learning
//! - LearnerResultRepository: persistence of learner results and steps
//! - MembershipOracle / LearningAlgorithm / EquivalenceOracle: learning strategies
//! - StrategyFactory: name-keyed construction of the strategies

pub mod connector;
pub mod equivalence_oracle;
pub mod learner_result_repository;
pub mod learning_algorithm;
pub mod membership_oracle;
pub mod strategy_factory;

pub use connector::{ConnectorFactory, ExecuteResult, SymbolConnector};
pub use equivalence_oracle::EquivalenceOracle;
pub use learner_result_repository::LearnerResultRepository;
pub use learning_algorithm::LearningAlgorithm;
pub use membership_oracle::MembershipOracle;
pub use strategy_factory::StrategyFactory;
