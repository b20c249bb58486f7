//! Domain errors for the statelearner engine.

use thiserror::Error;

use super::models::{ProjectId, TestNo};

/// Domain-level errors that can occur while learning.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input rejected before any work was done.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// No result with this test number in the project.
    #[error("Learner result not found: project {project_id}, test {test_no}")]
    ResultNotFound {
        /// Project searched.
        project_id: ProjectId,
        /// Missing test number.
        test_no: TestNo,
    },

    /// The project has no results at all.
    #[error("No learner result found for project {0}")]
    NoResultForProject(ProjectId),

    /// The project already has an active run.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The connector failed or was used after close.
    #[error("SUL execution failed: {0}")]
    SulExecution(String),

    /// A learner or oracle rejected its input.
    #[error("Learning algorithm error: {0}")]
    Algorithm(String),

    /// Persistence failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Whether this error belongs to the "not found" family.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ResultNotFound { .. } | Self::NoResultForProject(_))
    }

    /// Errors that end a running step (recorded on the step, never retried).
    pub const fn is_run_fatal(&self) -> bool {
        matches!(self, Self::SulExecution(_) | Self::Algorithm(_))
    }
}

/// Result alias used throughout the domain and services.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_families() {
        assert!(DomainError::NoResultForProject(1).is_not_found());
        assert!(DomainError::ResultNotFound { project_id: 1, test_no: 2 }.is_not_found());
        assert!(!DomainError::ValidationFailed("x".into()).is_not_found());

        assert!(DomainError::SulExecution("boom".into()).is_run_fatal());
        assert!(DomainError::Algorithm("boom".into()).is_run_fatal());
        assert!(!DomainError::ConcurrencyConflict("busy".into()).is_run_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = DomainError::ResultNotFound { project_id: 3, test_no: 7 };
        assert_eq!(err.to_string(), "Learner result not found: project 3, test 7");
    }
}
