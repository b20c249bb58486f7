//! In-memory learner result repository for tests and embedding.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LearnerResult, ProjectId, Step, TestNo};
use crate::domain::ports::LearnerResultRepository;

type ProjectResults = BTreeMap<TestNo, LearnerResult>;

/// Keeps all results in a map; cheap to clone, clones share the data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLearnerResultRepository {
    results: Arc<RwLock<HashMap<ProjectId, ProjectResults>>>,
}

impl InMemoryLearnerResultRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearnerResultRepository for InMemoryLearnerResultRepository {
    async fn create_result(&self, result: &LearnerResult) -> DomainResult<LearnerResult> {
        let mut results = self.results.write().await;
        let project = results.entry(result.project_id).or_default();
        let test_no = project.keys().next_back().map_or(1, |highest| highest + 1);

        let mut stored = result.clone();
        stored.test_no = test_no;
        stored.refresh_summary();
        project.insert(test_no, stored.clone());
        Ok(stored)
    }

    async fn save_step(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
        step: &Step,
    ) -> DomainResult<()> {
        let mut results = self.results.write().await;
        let result = results
            .get_mut(&project_id)
            .and_then(|project| project.get_mut(&test_no))
            .ok_or(DomainError::ResultNotFound {
                project_id,
                test_no,
            })?;
        result.upsert_step(step.clone())
    }

    async fn get_latest(&self, project_id: ProjectId) -> DomainResult<Option<LearnerResult>> {
        let results = self.results.read().await;
        Ok(results
            .get(&project_id)
            .and_then(|project| project.values().next_back().cloned()))
    }

    async fn get(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
    ) -> DomainResult<Option<LearnerResult>> {
        let results = self.results.read().await;
        Ok(results
            .get(&project_id)
            .and_then(|project| project.get(&test_no).cloned()))
    }

    async fn list(&self, project_id: ProjectId) -> DomainResult<Vec<LearnerResult>> {
        let results = self.results.read().await;
        Ok(results
            .get(&project_id)
            .map(|project| project.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, project_id: ProjectId, test_nos: &[TestNo]) -> DomainResult<u64> {
        let mut results = self.results.write().await;
        let Some(project) = results.get_mut(&project_id) else {
            return Ok(0);
        };
        let removed = test_nos
            .iter()
            .filter(|test_no| project.remove(*test_no).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Alphabet, EqOracleConfig, RunConfig, StepBudget};

    fn new_result(project_id: ProjectId) -> LearnerResult {
        let alphabet = Alphabet::new(["a"], "reset").unwrap();
        LearnerResult::new(RunConfig::new(project_id, 1, alphabet))
    }

    #[tokio::test]
    async fn test_test_numbers_are_per_project() {
        let repo = InMemoryLearnerResultRepository::new();
        assert_eq!(repo.create_result(&new_result(1)).await.unwrap().test_no, 1);
        assert_eq!(repo.create_result(&new_result(1)).await.unwrap().test_no, 2);
        assert_eq!(repo.create_result(&new_result(2)).await.unwrap().test_no, 1);

        assert_eq!(repo.get_latest(1).await.unwrap().unwrap().test_no, 2);
        assert!(repo.get_latest(3).await.unwrap().is_none());
        assert_eq!(repo.list(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_step_and_delete() {
        let repo = InMemoryLearnerResultRepository::new();
        let stored = repo.create_result(&new_result(1)).await.unwrap();
        let step = Step::new(1, EqOracleConfig::default(), StepBudget::UNBOUNDED);

        repo.save_step(1, stored.test_no, &step).await.unwrap();
        repo.save_step(1, stored.test_no, &step).await.unwrap();
        assert_eq!(repo.get(1, 1).await.unwrap().unwrap().steps.len(), 1);

        let missing = repo.save_step(1, 9, &step).await;
        assert!(matches!(missing, Err(DomainError::ResultNotFound { .. })));

        assert_eq!(repo.delete(1, &[1, 5]).await.unwrap(), 1);
        assert!(repo.get(1, 1).await.unwrap().is_none());
    }
}
