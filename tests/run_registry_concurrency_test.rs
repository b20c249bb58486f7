//! Admission control and cooperative cancellation under concurrent callers.

mod common;

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use statelearner::adapters::memory::InMemoryLearnerResultRepository;
use statelearner::application::{RunHandle, RunRegistry};
use statelearner::domain::errors::DomainError;
use statelearner::domain::models::{
    Alphabet, EqOracleConfig, LearnerConfig, ResumeCachePolicy, ResumeConfig, RunConfig,
    RunPhase, RunStatus, StepBudget,
};

use common::{
    memory_registry, mod_counter, registry_with, w, FailingFactory, GatedCreateRepository,
    GatedFactory,
};

fn gated_registry() -> (RunRegistry, Arc<GatedFactory>) {
    let factory = Arc::new(GatedFactory::new(mod_counter(3)));
    let registry = registry_with(
        factory.clone(),
        Arc::new(InMemoryLearnerResultRepository::new()),
    );
    (registry, factory)
}

fn config(project_id: i64) -> RunConfig {
    RunConfig::new(project_id, 1, Alphabet::new(["tick"], "reset").unwrap()).with_eq_oracle(
        EqOracleConfig::Sample {
            counter_examples: vec![w("tick tick tick")],
        },
    )
}

async fn wait_for_phase(handle: &RunHandle, phase: RunPhase) {
    let mut progress = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = progress.borrow_and_update().phase;
            if current == phase {
                return;
            }
            progress.changed().await.expect("run ended early");
        }
    })
    .await
    .expect("phase not reached in time");
}

#[tokio::test]
async fn test_one_active_run_per_project() {
    let (registry, factory) = gated_registry();

    let mut handle = registry.start(config(1)).await.unwrap();
    wait_for_phase(&handle, RunPhase::LearningFirst).await;

    let err = registry.start(config(1)).await.unwrap_err();
    assert!(matches!(err, DomainError::ConcurrencyConflict(_)));
    let err = registry
        .resume(1, handle.test_no(), ResumeConfig::new(StepBudget::UNBOUNDED))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ConcurrencyConflict(_)));

    // other projects are unaffected
    let mut other = registry.start(config(2)).await.unwrap();

    match registry.status(1).await {
        RunStatus::Active { phase, result } => {
            assert_eq!(phase, RunPhase::LearningFirst);
            assert_eq!(result.test_no, handle.test_no());
        }
        status => panic!("expected an active run, got {status:?}"),
    }

    factory.gate.add_permits(10_000);
    assert_eq!(handle.wait().await.unwrap().phase, RunPhase::Converged);
    assert_eq!(other.wait().await.unwrap().phase, RunPhase::Converged);

    // the project is free again once the run ended
    assert!(!registry.is_active(1).await);
    let mut again = registry.start(config(1)).await.unwrap();
    assert_eq!(again.test_no(), handle.test_no() + 1);
    assert_eq!(again.wait().await.unwrap().phase, RunPhase::Converged);
}

#[tokio::test]
async fn test_racing_starts_admit_exactly_one() {
    let (registry, factory) = gated_registry();

    let attempts = join_all((0..8).map(|_| registry.start(config(1)))).await;
    let mut admitted: Vec<RunHandle> = Vec::new();
    for attempt in attempts {
        match attempt {
            Ok(handle) => admitted.push(handle),
            Err(err) => assert!(matches!(err, DomainError::ConcurrencyConflict(_))),
        }
    }
    assert_eq!(admitted.len(), 1);

    factory.gate.add_permits(10_000);
    admitted[0].wait().await.unwrap();
    assert_eq!(registry.list_results(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stop_lets_the_in_flight_step_finish() {
    let (registry, factory) = gated_registry();

    let mut handle = registry
        .start(config(1).with_max_steps(StepBudget::UNBOUNDED))
        .await
        .unwrap();
    wait_for_phase(&handle, RunPhase::LearningFirst).await;

    let status = registry.stop(1).await;
    assert!(status.is_active());
    // stopping twice changes nothing
    assert!(registry.stop(1).await.is_active());

    factory.gate.add_permits(10_000);
    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.phase, RunPhase::Cancelled);
    assert_eq!(outcome.steps_performed, 1);

    let result = registry.latest_result(1).await.unwrap();
    assert_eq!(result.steps.len(), 1);
    let step = &result.steps[0];
    assert!(step.hypothesis.is_some());
    assert!(step.counter_example.is_some());
    assert!(step.error_text.is_none());
    assert!(factory.executed() > 0);

    match registry.stop(1).await {
        RunStatus::Idle { last_outcome } => {
            assert_eq!(last_outcome.map(|o| o.phase), Some(RunPhase::Cancelled));
        }
        status => panic!("expected idle, got {status:?}"),
    }
}

#[tokio::test]
async fn test_stop_wins_over_exhausted_budget() {
    let (registry, factory) = gated_registry();

    let mut handle = registry
        .start(config(1).with_max_steps(StepBudget::new(1).unwrap()))
        .await
        .unwrap();
    wait_for_phase(&handle, RunPhase::LearningFirst).await;
    handle.stop();

    factory.gate.add_permits(10_000);
    assert_eq!(handle.wait().await.unwrap().phase, RunPhase::Cancelled);
}

#[tokio::test]
async fn test_halted_run_resumes_to_convergence() {
    let (registry, factory) = gated_registry();
    factory.gate.add_permits(10_000);

    let mut handle = registry
        .start(config(1).with_max_steps(StepBudget::new(1).unwrap()))
        .await
        .unwrap();
    assert_eq!(handle.wait().await.unwrap().phase, RunPhase::BudgetExhausted);

    let mut resumed = registry
        .resume(1, handle.test_no(), ResumeConfig::new(StepBudget::UNBOUNDED))
        .await
        .unwrap();
    assert_eq!(resumed.test_no(), handle.test_no());
    let outcome = resumed.wait().await.unwrap();
    assert_eq!(outcome.phase, RunPhase::Converged);

    let result = registry.latest_result(1).await.unwrap();
    let numbers: Vec<u32> = result.steps.iter().map(|s| s.step_no).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert!(result.last_step().unwrap().counter_example.is_none());
}

#[tokio::test]
async fn test_only_the_latest_result_resumes() {
    let (registry, factory) = gated_registry();
    factory.gate.add_permits(10_000);

    let budget = StepBudget::new(1).unwrap();
    let mut first = registry.start(config(1).with_max_steps(budget)).await.unwrap();
    first.wait().await.unwrap();
    let mut second = registry.start(config(1).with_max_steps(budget)).await.unwrap();
    second.wait().await.unwrap();

    let err = registry
        .resume(1, first.test_no(), ResumeConfig::new(StepBudget::UNBOUNDED))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationFailed(_)));

    let err = registry
        .resume(1, 99, ResumeConfig::new(StepBudget::UNBOUNDED))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let mut resumed = registry
        .resume(1, second.test_no(), ResumeConfig::new(StepBudget::UNBOUNDED))
        .await
        .unwrap();
    assert_eq!(resumed.wait().await.unwrap().phase, RunPhase::Converged);
}

#[tokio::test]
async fn test_status_during_admission_reports_the_assigned_test_number() {
    let factory = Arc::new(GatedFactory::new(mod_counter(3)));
    let repository = Arc::new(GatedCreateRepository::new());
    let registry = Arc::new(registry_with(factory.clone(), repository.clone()));

    let starting = tokio::spawn({
        let registry = Arc::clone(&registry);
        async move { registry.start(config(1)).await }
    });
    repository.entered.notified().await;
    let observed = tokio::spawn({
        let registry = Arc::clone(&registry);
        async move { registry.status(1).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    repository.release.add_permits(1);

    let mut handle = starting.await.unwrap().unwrap();
    match observed.await.unwrap() {
        RunStatus::Active { result, .. } => assert_eq!(result.test_no, handle.test_no()),
        status => panic!("expected an active run, got {status:?}"),
    }

    factory.gate.add_permits(10_000);
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn test_connector_closed_once_per_run_on_every_exit() {
    let (registry, factory) = gated_registry();

    let mut cancelled = registry
        .start(config(1).with_max_steps(StepBudget::UNBOUNDED))
        .await
        .unwrap();
    wait_for_phase(&cancelled, RunPhase::LearningFirst).await;
    registry.stop(1).await;
    factory.gate.add_permits(10_000);
    assert_eq!(cancelled.wait().await.unwrap().phase, RunPhase::Cancelled);
    assert_eq!(factory.connectors.closed(), 1);

    let mut halted = registry
        .start(config(1).with_max_steps(StepBudget::new(1).unwrap()))
        .await
        .unwrap();
    assert_eq!(halted.wait().await.unwrap().phase, RunPhase::BudgetExhausted);
    assert_eq!(factory.connectors.closed(), 2);

    let mut resumed = registry
        .resume(1, halted.test_no(), ResumeConfig::new(StepBudget::UNBOUNDED))
        .await
        .unwrap();
    assert_eq!(resumed.wait().await.unwrap().phase, RunPhase::Converged);
    assert_eq!(factory.connectors.created(), 3);
    assert_eq!(factory.connectors.closed(), 3);
}

#[tokio::test]
async fn test_failed_run_closes_its_connector_once() {
    let factory = Arc::new(FailingFactory::new(mod_counter(3), 2));
    let registry = registry_with(
        factory.clone(),
        Arc::new(InMemoryLearnerResultRepository::new()),
    );

    let mut handle = registry.start(config(1)).await.unwrap();
    assert_eq!(handle.wait().await.unwrap().phase, RunPhase::Failed);
    assert_eq!(factory.connectors.created(), 1);
    assert_eq!(factory.connectors.closed(), 1);
}

/// Learner queries of the step that resumes a halted in-process run.
async fn resumed_learner_queries(policy: ResumeCachePolicy) -> u64 {
    let (registry, _repository) = memory_registry(mod_counter(3));
    let registry = registry.with_settings(LearnerConfig {
        resume_cache: policy,
        ..LearnerConfig::default()
    });

    let mut halted = registry
        .start(config(1).with_max_steps(StepBudget::new(1).unwrap()))
        .await
        .unwrap();
    assert_eq!(halted.wait().await.unwrap().phase, RunPhase::BudgetExhausted);

    let mut resumed = registry
        .resume(1, halted.test_no(), ResumeConfig::new(StepBudget::UNBOUNDED))
        .await
        .unwrap();
    assert_eq!(resumed.wait().await.unwrap().phase, RunPhase::Converged);

    let result = registry.latest_result(1).await.unwrap();
    assert_eq!(result.steps.len(), 2);
    result.steps[1].statistics.mqs_used.learner
}

#[tokio::test]
async fn test_carried_over_cache_answers_earlier_queries_on_resume() {
    let fresh = resumed_learner_queries(ResumeCachePolicy::Fresh).await;
    let carried = resumed_learner_queries(ResumeCachePolicy::CarryOver).await;

    assert!(fresh > 0);
    // the counterexample itself was already asked by the oracle in step 1
    assert!(carried < fresh, "carried over {carried}, fresh {fresh}");
}
