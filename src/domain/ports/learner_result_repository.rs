//! Persistence port for learner results.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LearnerResult, ProjectId, Step, TestNo};

/// Repository port for learner result persistence
#[async_trait]
pub trait LearnerResultRepository: Send + Sync {
    /// Persist a new result, assigning the next test number of its project.
    ///
    /// Returns the stored result carrying the assigned test number.
    async fn create_result(&self, result: &LearnerResult) -> DomainResult<LearnerResult>;

    /// Append a step, or replace the step with the same number.
    async fn save_step(&self, project_id: ProjectId, test_no: TestNo, step: &Step)
        -> DomainResult<()>;

    /// Result with the highest test number of a project
    async fn get_latest(&self, project_id: ProjectId) -> DomainResult<Option<LearnerResult>>;

    /// Get a result by project and test number
    async fn get(&self, project_id: ProjectId, test_no: TestNo)
        -> DomainResult<Option<LearnerResult>>;

    /// All results of a project, ordered by test number
    async fn list(&self, project_id: ProjectId) -> DomainResult<Vec<LearnerResult>>;

    /// Delete results by test number; returns how many were removed
    async fn delete(&self, project_id: ProjectId, test_nos: &[TestNo]) -> DomainResult<u64>;
}
