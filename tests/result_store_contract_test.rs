//! The same persistence contract, checked against both result stores.

mod common;

use statelearner::adapters::memory::InMemoryLearnerResultRepository;
use statelearner::adapters::sqlite::{
    create_migrated_test_pool, database_url, initialize_database, SqliteLearnerResultRepository,
};
use statelearner::domain::errors::DomainError;
use statelearner::domain::models::{
    Alphabet, CounterExampleQuery, EqOracleConfig, Hypothesis, LearnerResult, RunConfig, Step,
    StepBudget,
};
use statelearner::domain::ports::LearnerResultRepository;

use common::w;

fn new_result(project_id: i64) -> LearnerResult {
    let alphabet = Alphabet::new(["a", "b"], "reset").unwrap();
    LearnerResult::new(RunConfig::new(project_id, 9, alphabet).with_comment("contract"))
}

fn toggle_hypothesis() -> Hypothesis {
    Hypothesis::from_edges(
        &["a", "b"],
        0,
        &[
            (0, "a", "ok", 1),
            (0, "b", "s0", 0),
            (1, "a", "ok", 0),
            (1, "b", "s1", 1),
        ],
    )
    .unwrap()
}

fn learned_step(step_no: u32, counter_example: Option<CounterExampleQuery>) -> Step {
    let mut step = Step::new(
        step_no,
        EqOracleConfig::Complete {
            min_depth: 1,
            max_depth: 3,
        },
        StepBudget::new(5).unwrap(),
    );
    step.hypothesis = Some(toggle_hypothesis());
    step.counter_example = counter_example;
    step.statistics.mqs_used.learner = 6;
    step.statistics.mqs_used.eq_oracle = 3;
    step.statistics.eqs_used = 1;
    step.algorithm_information = format!("table of step {step_no}");
    step
}

async fn check_contract(repository: &dyn LearnerResultRepository) {
    assert!(repository.get_latest(1).await.unwrap().is_none());

    let first = repository.create_result(&new_result(1)).await.unwrap();
    let second = repository.create_result(&new_result(1)).await.unwrap();
    let other = repository.create_result(&new_result(2)).await.unwrap();
    assert_eq!((first.test_no, second.test_no, other.test_no), (1, 2, 1));

    // a step is inserted, then updated in place after the search phase
    let mut step = learned_step(1, None);
    repository.save_step(1, second.test_no, &step).await.unwrap();
    step.counter_example = Some(CounterExampleQuery::new(w("a"), w("b"), w("s0")));
    repository.save_step(1, second.test_no, &step).await.unwrap();
    repository
        .save_step(1, second.test_no, &learned_step(2, None))
        .await
        .unwrap();

    let gap = repository
        .save_step(1, second.test_no, &learned_step(4, None))
        .await;
    assert!(matches!(gap, Err(DomainError::ValidationFailed(_))));
    let missing = repository.save_step(1, 42, &learned_step(1, None)).await;
    assert!(matches!(missing, Err(DomainError::ResultNotFound { .. })));

    let latest = repository.get_latest(1).await.unwrap().unwrap();
    assert_eq!(latest.test_no, second.test_no);
    assert_eq!(latest.config.comment, "contract");
    assert_eq!(latest.steps.len(), 2);
    assert_eq!(
        latest.steps[0].counter_example,
        Some(CounterExampleQuery::new(w("a"), w("b"), w("s0")))
    );
    assert_eq!(latest.steps[1].algorithm_information, "table of step 2");
    assert_eq!(latest.steps[1].step_budget.value(), 5);
    assert_eq!(latest.steps[1].eq_oracle.name(), "complete");
    assert_eq!(latest.hypothesis, Some(toggle_hypothesis()));
    assert_eq!(latest.statistics.mqs_used.learner, 12);
    assert_eq!(latest.statistics.eqs_used, 2);

    let listed: Vec<i64> = repository
        .list(1)
        .await
        .unwrap()
        .iter()
        .map(|r| r.test_no)
        .collect();
    assert_eq!(listed, vec![1, 2]);

    assert_eq!(repository.delete(1, &[second.test_no, 77]).await.unwrap(), 1);
    assert!(repository.get(1, second.test_no).await.unwrap().is_none());
    assert_eq!(repository.get_latest(1).await.unwrap().unwrap().test_no, 1);
    assert_eq!(repository.list(2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_in_memory_store_contract() {
    check_contract(&InMemoryLearnerResultRepository::new()).await;
}

#[tokio::test]
async fn test_sqlite_store_contract() {
    let pool = create_migrated_test_pool().await.unwrap();
    check_contract(&SqliteLearnerResultRepository::new(pool)).await;
}

#[tokio::test]
async fn test_sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = database_url(&dir.path().join("nested/results.db").display().to_string());

    {
        let pool = initialize_database(&url, None).await.unwrap();
        let repository = SqliteLearnerResultRepository::new(pool.clone());
        let created = repository.create_result(&new_result(1)).await.unwrap();
        repository
            .save_step(1, created.test_no, &learned_step(1, None))
            .await
            .unwrap();
        pool.close().await;
    }

    // migrations are not re-applied to an up-to-date schema
    let pool = initialize_database(&url, None).await.unwrap();
    let repository = SqliteLearnerResultRepository::new(pool);
    let stored = repository.get(1, 1).await.unwrap().unwrap();
    assert_eq!(stored.steps.len(), 1);
    assert_eq!(stored.hypothesis.map(|h| h.size()), Some(2));
}
