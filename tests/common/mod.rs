//! Common test utilities for integration tests
//!
//! Scripted targets, connector factories with controllable behavior and a
//! repository wrapper that records the order of persisted steps.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use statelearner::adapters::connectors::{MealyTarget, ScriptedMealy, TargetEdge};
use statelearner::adapters::memory::InMemoryLearnerResultRepository;
use statelearner::application::RunRegistry;
use statelearner::domain::errors::{DomainError, DomainResult};
use statelearner::domain::models::{LearnerResult, ProjectId, Step, TestNo, Word};
use statelearner::domain::ports::{
    ConnectorFactory, ExecuteResult, LearnerResultRepository, SymbolConnector,
};
use statelearner::services::StrategyRegistry;

/// Two states; "a" toggles, "b" reports the current state.
pub const TOGGLE_YAML: &str = "
reset_symbol: reset
initial: s0
states:
  s0:
    a: { output: ok, target: s1 }
    b: { output: s0, target: s0 }
  s1:
    a: { output: ok, target: s0 }
    b: { output: s1, target: s1 }
";

pub fn toggle_target() -> MealyTarget {
    MealyTarget::from_yaml_str(TOGGLE_YAML).expect("toggle target")
}

/// Counter over `n` states whose "tick" only reports the wrap-around.
pub fn mod_counter(n: usize) -> MealyTarget {
    let states = (0..n)
        .map(|state| {
            let output = if state + 1 == n { "wrap" } else { "tick" };
            let edge = TargetEdge {
                output: output.to_string(),
                target: format!("c{}", (state + 1) % n),
            };
            (format!("c{state}"), BTreeMap::from([("tick".to_string(), edge)]))
        })
        .collect();
    MealyTarget {
        reset_symbol: "reset".to_string(),
        initial: "c0".to_string(),
        states,
    }
}

pub fn w(text: &str) -> Word {
    text.split_whitespace().map(str::to_string).collect()
}

pub fn registry_with(
    connectors: Arc<dyn ConnectorFactory>,
    repository: Arc<dyn LearnerResultRepository>,
) -> RunRegistry {
    RunRegistry::new(repository, connectors, Arc::new(StrategyRegistry::new()))
}

pub fn memory_registry(target: MealyTarget) -> (RunRegistry, Arc<InMemoryLearnerResultRepository>) {
    let repository = Arc::new(InMemoryLearnerResultRepository::new());
    let registry = registry_with(
        Arc::new(statelearner::adapters::connectors::ScriptedConnectorFactory::new(target)),
        repository.clone(),
    );
    (registry, repository)
}

/// Counts connectors handed out by a factory and how often they were closed.
#[derive(Debug, Default)]
pub struct ConnectorLog {
    created: AtomicUsize,
    closed: AtomicUsize,
}

impl ConnectorLog {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn record_create(&self) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector whose symbols each wait for one permit of a shared gate.
pub struct GatedFactory {
    target: Arc<MealyTarget>,
    pub gate: Arc<Semaphore>,
    pub executed: Arc<Mutex<Vec<String>>>,
    pub connectors: Arc<ConnectorLog>,
}

impl GatedFactory {
    pub fn new(target: MealyTarget) -> Self {
        Self {
            target: Arc::new(target),
            gate: Arc::new(Semaphore::new(0)),
            executed: Arc::new(Mutex::new(Vec::new())),
            connectors: Arc::new(ConnectorLog::default()),
        }
    }

    pub fn executed(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

struct GatedConnector {
    inner: ScriptedMealy,
    gate: Arc<Semaphore>,
    executed: Arc<Mutex<Vec<String>>>,
    log: Arc<ConnectorLog>,
}

#[async_trait]
impl SymbolConnector for GatedConnector {
    async fn reset(&mut self) -> DomainResult<()> {
        self.inner.reset().await
    }

    async fn execute(&mut self, symbol: &str) -> DomainResult<ExecuteResult> {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.executed.lock().unwrap().push(symbol.to_string());
        self.inner.execute(symbol).await
    }

    async fn close(&mut self) -> DomainResult<()> {
        self.log.record_close();
        self.inner.close().await
    }
}

impl ConnectorFactory for GatedFactory {
    fn create(&self, _project_id: ProjectId) -> DomainResult<Box<dyn SymbolConnector>> {
        self.connectors.record_create();
        Ok(Box::new(GatedConnector {
            inner: ScriptedMealy::new(Arc::clone(&self.target)),
            gate: Arc::clone(&self.gate),
            executed: Arc::clone(&self.executed),
            log: Arc::clone(&self.connectors),
        }))
    }
}

/// Connector that breaks once `healthy_symbols` symbols were executed.
pub struct FailingFactory {
    target: Arc<MealyTarget>,
    healthy_symbols: usize,
    pub connectors: Arc<ConnectorLog>,
}

impl FailingFactory {
    pub fn new(target: MealyTarget, healthy_symbols: usize) -> Self {
        Self {
            target: Arc::new(target),
            healthy_symbols,
            connectors: Arc::new(ConnectorLog::default()),
        }
    }
}

struct FailingConnector {
    inner: ScriptedMealy,
    remaining: usize,
    log: Arc<ConnectorLog>,
}

#[async_trait]
impl SymbolConnector for FailingConnector {
    async fn reset(&mut self) -> DomainResult<()> {
        self.inner.reset().await
    }

    async fn execute(&mut self, symbol: &str) -> DomainResult<ExecuteResult> {
        if self.remaining == 0 {
            return Err(DomainError::SulExecution("connection refused".to_string()));
        }
        self.remaining -= 1;
        self.inner.execute(symbol).await
    }

    async fn close(&mut self) -> DomainResult<()> {
        self.log.record_close();
        self.inner.close().await
    }
}

impl ConnectorFactory for FailingFactory {
    fn create(&self, _project_id: ProjectId) -> DomainResult<Box<dyn SymbolConnector>> {
        self.connectors.record_create();
        Ok(Box::new(FailingConnector {
            inner: ScriptedMealy::new(Arc::clone(&self.target)),
            remaining: self.healthy_symbols,
            log: Arc::clone(&self.connectors),
        }))
    }
}

/// Wraps the in-memory repository and logs every saved `(test_no, step_no)`.
#[derive(Clone, Default)]
pub struct RecordingRepository {
    inner: InMemoryLearnerResultRepository,
    pub saved: Arc<Mutex<Vec<(TestNo, u32)>>>,
}

impl RecordingRepository {
    pub fn saved(&self) -> Vec<(TestNo, u32)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl LearnerResultRepository for RecordingRepository {
    async fn create_result(&self, result: &LearnerResult) -> DomainResult<LearnerResult> {
        self.inner.create_result(result).await
    }

    async fn save_step(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
        step: &Step,
    ) -> DomainResult<()> {
        self.saved.lock().unwrap().push((test_no, step.step_no));
        self.inner.save_step(project_id, test_no, step).await
    }

    async fn get_latest(&self, project_id: ProjectId) -> DomainResult<Option<LearnerResult>> {
        self.inner.get_latest(project_id).await
    }

    async fn get(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
    ) -> DomainResult<Option<LearnerResult>> {
        self.inner.get(project_id, test_no).await
    }

    async fn list(&self, project_id: ProjectId) -> DomainResult<Vec<LearnerResult>> {
        self.inner.list(project_id).await
    }

    async fn delete(&self, project_id: ProjectId, test_nos: &[TestNo]) -> DomainResult<u64> {
        self.inner.delete(project_id, test_nos).await
    }
}

/// In-memory repository whose `create_result` waits for one permit of `release`.
pub struct GatedCreateRepository {
    inner: InMemoryLearnerResultRepository,
    /// Notified once a creation is waiting.
    pub entered: Notify,
    pub release: Semaphore,
}

impl GatedCreateRepository {
    pub fn new() -> Self {
        Self {
            inner: InMemoryLearnerResultRepository::new(),
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl LearnerResultRepository for GatedCreateRepository {
    async fn create_result(&self, result: &LearnerResult) -> DomainResult<LearnerResult> {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
        self.inner.create_result(result).await
    }

    async fn save_step(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
        step: &Step,
    ) -> DomainResult<()> {
        self.inner.save_step(project_id, test_no, step).await
    }

    async fn get_latest(&self, project_id: ProjectId) -> DomainResult<Option<LearnerResult>> {
        self.inner.get_latest(project_id).await
    }

    async fn get(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
    ) -> DomainResult<Option<LearnerResult>> {
        self.inner.get(project_id, test_no).await
    }

    async fn list(&self, project_id: ProjectId) -> DomainResult<Vec<LearnerResult>> {
        self.inner.list(project_id).await
    }

    async fn delete(&self, project_id: ProjectId, test_nos: &[TestNo]) -> DomainResult<u64> {
        self.inner.delete(project_id, test_nos).await
    }
}

/// Setup test logging
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
