//! RunRegistry - admission control and lifecycle bookkeeping for learning runs
//!
//! At most one run is active per project. Admission checks and reserves the
//! project in one critical section; the entry is removed when the run's
//! controller reaches a terminal phase.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Alphabet, Hypothesis, LearnerConfig, LearnerResult, ProjectId, ResumeCachePolicy,
    ResumeConfig, RunConfig, RunOutcome, RunPhase, RunStatus, TestNo, Word,
};
use crate::domain::ports::{
    ConnectorFactory, EquivalenceOracle, LearnerResultRepository, LearningAlgorithm,
    MembershipOracle, StrategyFactory,
};
use crate::services::membership_cache::{CacheEntries, QueryPipeline};
use crate::services::query_executor::QueryExecutor;

use super::step_controller::{RunMode, RunPlan, RunProgress, StepController};

struct ActiveRun {
    run_id: Uuid,
    token: CancellationToken,
    progress: watch::Receiver<RunProgress>,
}

/// Learner kept after a run halted, so a resume in this process can skip replay.
struct HaltedRun {
    test_no: TestNo,
    learner: Box<dyn LearningAlgorithm>,
    cache: Option<CacheEntries>,
}

#[derive(Default)]
struct RegistryState {
    active: HashMap<ProjectId, ActiveRun>,
    last_outcomes: HashMap<ProjectId, RunOutcome>,
    halted: HashMap<ProjectId, HaltedRun>,
}

/// Handle to a launched run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    project_id: ProjectId,
    test_no: TestNo,
    token: CancellationToken,
    progress: watch::Receiver<RunProgress>,
}

impl RunHandle {
    /// Project the run belongs to.
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Test number of the result this run appends to.
    pub fn test_no(&self) -> TestNo {
        self.test_no
    }

    /// Current phase of the run.
    pub fn phase(&self) -> RunPhase {
        self.progress.borrow().phase
    }

    /// Request a cooperative stop; same effect as `RunRegistry::stop`.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Receiver notified on every phase change and persisted step.
    pub fn subscribe(&self) -> watch::Receiver<RunProgress> {
        self.progress.clone()
    }

    /// Wait until the run terminated and was deregistered.
    pub async fn wait(&mut self) -> DomainResult<RunOutcome> {
        loop {
            if let Some(outcome) = self.progress.borrow_and_update().outcome.clone() {
                return Ok(outcome);
            }
            if self.progress.changed().await.is_err() {
                return self.progress.borrow().outcome.clone().ok_or_else(|| {
                    DomainError::Algorithm(format!(
                        "run {} of project {} ended without an outcome",
                        self.test_no, self.project_id
                    ))
                });
            }
        }
    }
}

/// Starts, resumes, stops and reports learning runs.
pub struct RunRegistry {
    repository: Arc<dyn LearnerResultRepository>,
    connectors: Arc<dyn ConnectorFactory>,
    strategies: Arc<dyn StrategyFactory>,
    settings: LearnerConfig,
    state: Arc<Mutex<RegistryState>>,
}

impl RunRegistry {
    /// Registry with default learner settings.
    pub fn new(
        repository: Arc<dyn LearnerResultRepository>,
        connectors: Arc<dyn ConnectorFactory>,
        strategies: Arc<dyn StrategyFactory>,
    ) -> Self {
        Self {
            repository,
            connectors,
            strategies,
            settings: LearnerConfig::default(),
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// Replace the learner settings.
    pub fn with_settings(mut self, settings: LearnerConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Learner settings applied to new runs.
    pub fn settings(&self) -> &LearnerConfig {
        &self.settings
    }

    /// Start a new learner result for `config.project_id`.
    pub async fn start(&self, config: RunConfig) -> DomainResult<RunHandle> {
        config.validate()?;
        let project_id = config.project_id;
        let learner = self
            .strategies
            .create_learning_algorithm(config.algorithm, &config.alphabet)?;
        let eq_oracle = self
            .strategies
            .create_equivalence_oracle(&config.eq_oracle, &config.alphabet)?;

        // the result is created inside the critical section, so `status`
        // never reports a reserved run without its test number
        let (run_id, token, progress_tx, result, executor) = {
            let mut state = self.state.lock().await;
            if state.active.contains_key(&project_id) {
                return Err(conflict(project_id));
            }
            let connector = self.connectors.create(project_id)?;
            let mut executor = QueryExecutor::new(connector, &config.alphabet);
            let created = self
                .repository
                .create_result(&LearnerResult::new(config.clone()))
                .await;
            let result = match created {
                Ok(result) => result,
                Err(err) => {
                    if let Err(close_err) = executor.close().await {
                        warn!(error = %close_err, "failed to close unused query executor");
                    }
                    return Err(err);
                }
            };
            // a new result makes any halted learner of this project stale
            state.halted.remove(&project_id);
            let run_id = Uuid::new_v4();
            let token = CancellationToken::new();
            let (tx, rx) = watch::channel(RunProgress::new(result.clone()));
            state.active.insert(
                project_id,
                ActiveRun {
                    run_id,
                    token: token.clone(),
                    progress: rx,
                },
            );
            (run_id, token, tx, result, executor)
        };

        info!(
            project_id,
            test_no = result.test_no,
            algorithm = %config.algorithm,
            eq_oracle = config.eq_oracle.name(),
            "starting learning run"
        );
        let plan = RunPlan {
            mode: RunMode::Start,
            eq_oracle: config.eq_oracle.clone(),
            budget: config.max_steps,
        };
        let pipeline = QueryPipeline::new(executor, config.use_mq_cache, None);
        Ok(self.launch(result, learner, eq_oracle, pipeline, plan, run_id, token, progress_tx))
    }

    /// Continue a halted result with a new step budget and optionally another oracle.
    pub async fn resume(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
        resume: ResumeConfig,
    ) -> DomainResult<RunHandle> {
        resume.validate()?;
        if self.state.lock().await.active.contains_key(&project_id) {
            return Err(conflict(project_id));
        }

        let result = self.resumable_result(project_id, test_no).await?;
        let eq_config = resume
            .eq_oracle
            .clone()
            .or_else(|| result.last_step().map(|s| s.eq_oracle.clone()))
            .unwrap_or_else(|| result.config.eq_oracle.clone());
        let eq_oracle = self
            .strategies
            .create_equivalence_oracle(&eq_config, &result.alphabet)?;

        let (run_id, token, progress_tx, halted) = {
            let mut state = self.state.lock().await;
            if state.active.contains_key(&project_id) {
                return Err(conflict(project_id));
            }
            let halted = state
                .halted
                .remove(&project_id)
                .filter(|h| h.test_no == test_no);
            let run_id = Uuid::new_v4();
            let token = CancellationToken::new();
            let (tx, rx) = watch::channel(RunProgress::new(result.clone()));
            state.active.insert(
                project_id,
                ActiveRun {
                    run_id,
                    token: token.clone(),
                    progress: rx,
                },
            );
            (run_id, token, tx, halted)
        };

        let admitted = async {
            // another run may have created a newer result before we reserved
            self.ensure_latest(project_id, test_no).await?;
            let connector = self.connectors.create(project_id)?;
            Ok::<_, DomainError>(QueryExecutor::new(connector, &result.alphabet))
        }
        .await;
        let executor = match admitted {
            Ok(executor) => executor,
            Err(err) => {
                self.release(project_id, run_id).await;
                return Err(err);
            }
        };

        let (learner, cache, reconstruct) = match halted {
            Some(halted) => (halted.learner, halted.cache, false),
            None => {
                match self
                    .strategies
                    .create_learning_algorithm(result.config.algorithm, &result.alphabet)
                {
                    Ok(learner) => (learner, None, true),
                    Err(err) => {
                        let mut executor = executor;
                        if let Err(close_err) = executor.close().await {
                            warn!(error = %close_err, "failed to close unused query executor");
                        }
                        self.release(project_id, run_id).await;
                        return Err(err);
                    }
                }
            }
        };
        let cache = match self.settings.resume_cache {
            ResumeCachePolicy::Fresh => None,
            ResumeCachePolicy::CarryOver => cache,
        };

        info!(
            project_id,
            test_no,
            reconstruct,
            eq_oracle = eq_config.name(),
            "resuming learning run"
        );
        let plan = RunPlan {
            mode: RunMode::Resume { reconstruct },
            eq_oracle: eq_config,
            budget: resume.max_steps,
        };
        let pipeline = QueryPipeline::new(executor, result.config.use_mq_cache, cache);
        Ok(self.launch(result, learner, eq_oracle, pipeline, plan, run_id, token, progress_tx))
    }

    /// Request a cooperative stop. No-op when nothing is running.
    pub async fn stop(&self, project_id: ProjectId) -> RunStatus {
        {
            let state = self.state.lock().await;
            if let Some(run) = state.active.get(&project_id) {
                info!(project_id, "stop requested");
                run.token.cancel();
            }
        }
        self.status(project_id).await
    }

    /// Snapshot of the active run, or the last outcome recorded in this process.
    pub async fn status(&self, project_id: ProjectId) -> RunStatus {
        let state = self.state.lock().await;
        match state.active.get(&project_id) {
            Some(run) => {
                let progress = run.progress.borrow();
                RunStatus::Active {
                    phase: progress.phase,
                    result: Box::new(progress.result.clone()),
                }
            }
            None => RunStatus::Idle {
                last_outcome: state.last_outcomes.get(&project_id).cloned(),
            },
        }
    }

    /// Whether the project has a run in flight.
    pub async fn is_active(&self, project_id: ProjectId) -> bool {
        self.state.lock().await.active.contains_key(&project_id)
    }

    /// Result with the highest test number.
    pub async fn latest_result(&self, project_id: ProjectId) -> DomainResult<LearnerResult> {
        self.repository
            .get_latest(project_id)
            .await?
            .ok_or(DomainError::NoResultForProject(project_id))
    }

    /// Result `test_no` of the project.
    pub async fn result(&self, project_id: ProjectId, test_no: TestNo) -> DomainResult<LearnerResult> {
        self.repository
            .get(project_id, test_no)
            .await?
            .ok_or(DomainError::ResultNotFound {
                project_id,
                test_no,
            })
    }

    /// All results of the project, oldest first.
    pub async fn list_results(&self, project_id: ProjectId) -> DomainResult<Vec<LearnerResult>> {
        self.repository.list(project_id).await
    }

    /// Delete stored results; the result of an active run cannot be deleted.
    pub async fn delete_results(
        &self,
        project_id: ProjectId,
        test_nos: &[TestNo],
    ) -> DomainResult<u64> {
        let mut state = self.state.lock().await;
        if let Some(run) = state.active.get(&project_id) {
            let running = run.progress.borrow().result.test_no;
            if test_nos.contains(&running) {
                return Err(DomainError::ConcurrencyConflict(format!(
                    "result {running} of project {project_id} is still running"
                )));
            }
        }
        if state
            .halted
            .get(&project_id)
            .is_some_and(|h| test_nos.contains(&h.test_no))
        {
            state.halted.remove(&project_id);
        }
        // holding the lock keeps a run from starting on a result being deleted
        self.repository.delete(project_id, test_nos).await
    }

    /// Run one word against a fresh connector and return the outputs.
    pub async fn read_outputs(
        &self,
        project_id: ProjectId,
        alphabet: &Alphabet,
        word: &[String],
    ) -> DomainResult<Word> {
        alphabet.validate()?;
        alphabet.check_word(word)?;

        let connector = self.connectors.create(project_id)?;
        let mut executor = QueryExecutor::new(connector, alphabet);
        let answered = executor.answer(word).await;
        let closed = executor.close().await;
        let output = answered?;
        closed?;
        Ok(output)
    }

    /// Shortest word on which two hypotheses differ, if any.
    pub fn compare(&self, first: &Hypothesis, second: &Hypothesis) -> DomainResult<Option<Word>> {
        first.separating_word(second)
    }

    async fn resumable_result(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
    ) -> DomainResult<LearnerResult> {
        let result = self
            .repository
            .get(project_id, test_no)
            .await?
            .ok_or(DomainError::ResultNotFound {
                project_id,
                test_no,
            })?;
        self.ensure_latest(project_id, test_no).await?;
        if let Some(step) = result.last_step().filter(|s| s.is_error()) {
            return Err(DomainError::ValidationFailed(format!(
                "result {test_no} ended with an error in step {} and cannot be resumed",
                step.step_no
            )));
        }
        Ok(result)
    }

    async fn ensure_latest(&self, project_id: ProjectId, test_no: TestNo) -> DomainResult<()> {
        let latest = self
            .repository
            .get_latest(project_id)
            .await?
            .map(|r| r.test_no);
        if latest != Some(test_no) {
            return Err(DomainError::ValidationFailed(format!(
                "only the latest result of project {project_id} can be resumed, not {test_no}"
            )));
        }
        Ok(())
    }

    async fn release(&self, project_id: ProjectId, run_id: Uuid) {
        let mut state = self.state.lock().await;
        if state
            .active
            .get(&project_id)
            .is_some_and(|run| run.run_id == run_id)
        {
            state.active.remove(&project_id);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn launch(
        &self,
        result: LearnerResult,
        learner: Box<dyn LearningAlgorithm>,
        eq_oracle: Box<dyn EquivalenceOracle>,
        pipeline: QueryPipeline,
        plan: RunPlan,
        run_id: Uuid,
        token: CancellationToken,
        progress_tx: watch::Sender<RunProgress>,
    ) -> RunHandle {
        let project_id = result.project_id;
        let test_no = result.test_no;
        let progress_tx = Arc::new(progress_tx);
        progress_tx.send_modify(|progress| progress.result = result.clone());

        let handle = RunHandle {
            project_id,
            test_no,
            token: token.clone(),
            progress: progress_tx.subscribe(),
        };

        let controller = StepController::new(
            result,
            Arc::clone(&self.repository),
            learner,
            eq_oracle,
            pipeline,
            plan,
            token,
            Arc::clone(&progress_tx),
        );
        let state = Arc::clone(&self.state);
        let span = info_span!("learning_run", project_id, test_no);

        tokio::spawn(
            async move {
                let exit = controller.run().await;
                let outcome = exit.outcome.clone();
                {
                    let mut state = state.lock().await;
                    if state
                        .active
                        .get(&project_id)
                        .is_some_and(|run| run.run_id == run_id)
                    {
                        state.active.remove(&project_id);
                    }
                    state.last_outcomes.insert(project_id, outcome.clone());
                    match exit.learner {
                        Some(learner) => {
                            state.halted.insert(
                                project_id,
                                HaltedRun {
                                    test_no,
                                    learner,
                                    cache: exit.cache,
                                },
                            );
                        }
                        None => {
                            state.halted.remove(&project_id);
                        }
                    }
                }
                progress_tx.send_modify(|progress| {
                    progress.phase = outcome.phase;
                    progress.outcome = Some(outcome);
                });
            }
            .instrument(span),
        );

        handle
    }
}

fn conflict(project_id: ProjectId) -> DomainError {
    DomainError::ConcurrencyConflict(format!(
        "a learning run is already active for project {project_id}"
    ))
}
