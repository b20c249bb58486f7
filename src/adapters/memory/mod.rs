//! In-memory adapters.

pub mod learner_result_repository;

pub use learner_result_repository::InMemoryLearnerResultRepository;
