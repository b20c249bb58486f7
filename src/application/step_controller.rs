//! StepController - the learn/search run loop of a single learner result
//!
//! Each step runs a learning phase (start or refine) followed by an
//! equivalence search. The step is persisted after each phase, so a crash
//! leaves a consistent prefix of steps that can be resumed.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CounterExampleQuery, EqOracleConfig, Hypothesis, LearnerResult, RunOutcome, RunPhase, Step,
    StepBudget,
};
use crate::domain::ports::{EquivalenceOracle, LearnerResultRepository, LearningAlgorithm};
use crate::services::membership_cache::{CacheEntries, QueryPipeline};


/// Live view of a run, published after every phase change.
#[derive(Debug, Clone)]
pub struct RunProgress {
    /// Phase reached most recently.
    pub phase: RunPhase,
    /// Result as of the last persisted change.
    pub result: LearnerResult,
    /// Set once the run has terminated and been deregistered.
    pub outcome: Option<RunOutcome>,
}

impl RunProgress {
    /// Progress of a run that has not executed anything.
    pub fn new(result: LearnerResult) -> Self {
        Self {
            phase: RunPhase::Init,
            result,
            outcome: None,
        }
    }
}

/// How the first step of an invocation begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// New result: the first step starts learning from scratch.
    Start,
    /// Continue a halted result.
    Resume {
        /// The learner is fresh and must first replay the persisted
        /// counterexamples.
        reconstruct: bool,
    },
}

/// Parameters of one controller invocation.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// How the first step begins.
    pub mode: RunMode,
    /// Oracle for every step of this invocation.
    pub eq_oracle: EqOracleConfig,
    /// Steps this invocation may perform.
    pub budget: StepBudget,
}

/// What a finished controller hands back to the registry.
pub struct ControllerExit {
    /// How the invocation ended.
    pub outcome: RunOutcome,
    /// The learner, unless the run failed.
    pub learner: Option<Box<dyn LearningAlgorithm>>,
    /// Membership cache contents, when caching was enabled.
    pub cache: Option<CacheEntries>,
}

/// Drives one run invocation through learn, search and refine steps.
///
/// The result is persisted after every phase change. Cancellation is only
/// observed between steps.
pub struct StepController {
    result: LearnerResult,
    repository: Arc<dyn LearnerResultRepository>,
    learner: Box<dyn LearningAlgorithm>,
    eq_oracle: Box<dyn EquivalenceOracle>,
    pipeline: QueryPipeline,
    plan: RunPlan,
    token: CancellationToken,
    progress: Arc<watch::Sender<RunProgress>>,
    current: Option<Step>,
    steps_performed: u32,
}

impl StepController {
    /// Controller for `result`; nothing runs until `run` is awaited.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        result: LearnerResult,
        repository: Arc<dyn LearnerResultRepository>,
        learner: Box<dyn LearningAlgorithm>,
        eq_oracle: Box<dyn EquivalenceOracle>,
        pipeline: QueryPipeline,
        plan: RunPlan,
        token: CancellationToken,
        progress: Arc<watch::Sender<RunProgress>>,
    ) -> Self {
        Self {
            result,
            repository,
            learner,
            eq_oracle,
            pipeline,
            plan,
            token,
            progress,
            current: None,
            steps_performed: 0,
        }
    }

    /// Drive the run to a terminal phase.
    ///
    /// Never fails: errors and panics of the strategies end the run `Failed`
    /// with the message recorded on the current step. The query pipeline is
    /// closed on every path.
    pub async fn run(mut self) -> ControllerExit {
        let started = Instant::now();
        let driven = AssertUnwindSafe(self.drive()).catch_unwind().await;

        let (phase, error) = match driven {
            Ok(Ok(phase)) => (phase, None),
            Ok(Err(err)) => (RunPhase::Failed, Some(err.to_string())),
            Err(panic) => (RunPhase::Failed, Some(panic_message(panic.as_ref()))),
        };

        if let Some(message) = &error {
            error!(
                project_id = self.result.project_id,
                test_no = self.result.test_no,
                error = %message,
                "learning run failed"
            );
            self.record_failure(message).await;
        }

        if let Err(err) = self.pipeline.close().await {
            warn!(error = %err, "failed to close query executor");
        }

        let outcome = RunOutcome {
            test_no: self.result.test_no,
            phase,
            steps_performed: self.steps_performed,
            error,
        };
        let cache = self.pipeline.cache_stats().unwrap_or_default();
        info!(
            project_id = self.result.project_id,
            test_no = self.result.test_no,
            phase = %phase,
            steps = self.steps_performed,
            cache_hits = cache.hits,
            cache_misses = cache.misses,
            duration_ms = started.elapsed().as_millis() as u64,
            "learning run finished"
        );
        self.set_phase(phase);

        let learner = (phase != RunPhase::Failed).then_some(self.learner);
        ControllerExit {
            outcome,
            learner,
            cache: self.pipeline.into_entries(),
        }
    }

    async fn drive(&mut self) -> DomainResult<RunPhase> {
        let mut counter_example = match self.plan.mode {
            RunMode::Resume { reconstruct } if self.result.last_step().is_some() => {
                let previous = self
                    .result
                    .last_step()
                    .and_then(|s| s.counter_example.clone());
                self.resumed_step(previous, reconstruct).await?
            }
            _ => self.first_step().await?,
        };

        loop {
            if counter_example.is_none() {
                return Ok(RunPhase::Converged);
            }
            if self.token.is_cancelled() {
                info!(project_id = self.result.project_id, "stop requested, ending run");
                return Ok(RunPhase::Cancelled);
            }
            if self.plan.budget.is_exhausted(i64::from(self.steps_performed)) {
                return Ok(RunPhase::BudgetExhausted);
            }
            counter_example = self.successive_step(counter_example).await?;
        }
    }

    async fn first_step(&mut self) -> DomainResult<Option<CounterExampleQuery>> {
        self.begin_step();
        self.set_phase(RunPhase::LearningFirst);

        let started = Instant::now();
        self.pipeline.take_counters();
        let hypothesis = self.learner.start_learning(&mut self.pipeline).await?;
        self.finish_learning_phase(hypothesis, started).await?;

        self.search().await
    }

    async fn successive_step(
        &mut self,
        counter_example: Option<CounterExampleQuery>,
    ) -> DomainResult<Option<CounterExampleQuery>> {
        self.begin_step();
        self.set_phase(RunPhase::Refining);

        let started = Instant::now();
        self.pipeline.take_counters();
        let hypothesis = match &counter_example {
            Some(ce) => self.learner.refine_hypothesis(&mut self.pipeline, ce).await?,
            None => self.current_hypothesis()?,
        };
        self.finish_learning_phase(hypothesis, started).await?;

        self.search().await
    }

    /// First step of a resumed invocation; rebuilds the learner when needed.
    async fn resumed_step(
        &mut self,
        counter_example: Option<CounterExampleQuery>,
        reconstruct: bool,
    ) -> DomainResult<Option<CounterExampleQuery>> {
        self.begin_step();
        self.set_phase(RunPhase::Refining);

        let started = Instant::now();
        self.pipeline.take_counters();
        if reconstruct {
            self.reconstruct_learner().await?;
        }
        let hypothesis = match &counter_example {
            Some(ce) => self.learner.refine_hypothesis(&mut self.pipeline, ce).await?,
            None => {
                debug!("last step converged, searching again without refinement");
                self.current_hypothesis()?
            }
        };
        self.finish_learning_phase(hypothesis, started).await?;

        self.search().await
    }

    /// Replay start and all counterexamples the halted learner had already seen.
    async fn reconstruct_learner(&mut self) -> DomainResult<()> {
        // the last step's counterexample is refined by the new step itself
        let replayed = self.result.steps.len().saturating_sub(1);
        let seen: Vec<CounterExampleQuery> = self.result.steps[..replayed]
            .iter()
            .filter_map(|s| s.counter_example.clone())
            .collect();
        debug!(
            counter_examples = seen.len(),
            "reconstructing learner from persisted counterexamples"
        );

        let mut hypothesis = self.learner.start_learning(&mut self.pipeline).await?;
        for ce in &seen {
            if hypothesis.suffix_output(&ce.prefix, &ce.suffix).as_ref() == Some(&ce.output) {
                continue;
            }
            hypothesis = self.learner.refine_hypothesis(&mut self.pipeline, ce).await?;
        }
        Ok(())
    }

    async fn finish_learning_phase(
        &mut self,
        hypothesis: Hypothesis,
        started: Instant,
    ) -> DomainResult<()> {
        let counters = self.pipeline.take_counters();
        let diagnostics = self.learner.internal_diagnostics().unwrap_or_default();
        let step = self.step_mut()?;
        step.statistics.duration_ms.learner = elapsed_ms(started);
        step.statistics.mqs_used.learner = counters.resets;
        step.statistics.symbols_used.learner = counters.symbols;
        step.hypothesis = Some(hypothesis);
        step.algorithm_information = diagnostics;
        self.persist_current().await
    }

    async fn search(&mut self) -> DomainResult<Option<CounterExampleQuery>> {
        self.set_phase(RunPhase::SearchingCounterexample);
        let hypothesis = self.current_hypothesis()?;

        let started = Instant::now();
        let counter_example = self
            .eq_oracle
            .find_counter_example(&mut self.pipeline, &hypothesis, &self.result.alphabet)
            .await?;
        let counters = self.pipeline.take_counters();

        let step = self.step_mut()?;
        step.statistics.duration_ms.eq_oracle = elapsed_ms(started);
        step.statistics.mqs_used.eq_oracle = counters.resets;
        step.statistics.symbols_used.eq_oracle = counters.symbols;
        step.statistics.eqs_used += 1;
        step.counter_example = counter_example.clone();
        let step_no = step.step_no;
        self.persist_current().await?;

        match &counter_example {
            Some(ce) => info!(step_no, counter_example = %ce, "step found counterexample"),
            None => info!(step_no, "step found no counterexample"),
        }
        if let Some(cache) = self.pipeline.cache_stats() {
            debug!(step_no, hits = cache.hits, misses = cache.misses, "membership cache");
        }
        Ok(counter_example)
    }

    fn begin_step(&mut self) {
        let step = Step::new(
            self.result.next_step_no(),
            self.plan.eq_oracle.clone(),
            self.plan.budget,
        );
        debug!(step_no = step.step_no, "beginning step");
        self.current = Some(step);
        self.steps_performed += 1;
    }

    fn step_mut(&mut self) -> DomainResult<&mut Step> {
        self.current
            .as_mut()
            .ok_or_else(|| DomainError::Algorithm("no step in progress".to_string()))
    }

    fn current_hypothesis(&self) -> DomainResult<Hypothesis> {
        self.current
            .as_ref()
            .and_then(|s| s.hypothesis.clone())
            .or_else(|| self.learner.hypothesis().cloned())
            .ok_or_else(|| DomainError::Algorithm("learner has no hypothesis".to_string()))
    }

    async fn persist_current(&mut self) -> DomainResult<()> {
        let step = self
            .current
            .clone()
            .ok_or_else(|| DomainError::Algorithm("no step in progress".to_string()))?;
        self.repository
            .save_step(self.result.project_id, self.result.test_no, &step)
            .await?;
        self.result.upsert_step(step)?;
        self.publish();
        Ok(())
    }

    async fn record_failure(&mut self, message: &str) {
        let Some(step) = self.current.as_mut() else {
            return;
        };
        step.error_text = Some(message.to_string());
        if let Err(err) = self.persist_current().await {
            error!(error = %err, "failed to persist failed step");
        }
    }

    fn set_phase(&self, phase: RunPhase) {
        self.progress.send_modify(|progress| progress.phase = phase);
    }

    fn publish(&self) {
        let snapshot = self.result.clone();
        self.progress
            .send_modify(move |progress| progress.result = snapshot);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic: unknown cause".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLearnerResultRepository;
    use crate::domain::models::{Alphabet, RunConfig};
    use crate::domain::ports::LearnerResultRepository;
    use crate::services::algorithms::tests::w;
    use crate::services::algorithms::LStar;
    use crate::services::oracles::SampleOracle;
    use crate::adapters::connectors::scripted::tests::toggle_target;
    use crate::adapters::connectors::ScriptedMealy;
    use crate::services::query_executor::QueryExecutor;

    async fn controller(
        eq_words: Vec<Vec<String>>,
        budget: StepBudget,
    ) -> (StepController, Arc<InMemoryLearnerResultRepository>) {
        let alphabet = Alphabet::new(["a", "b"], "reset").unwrap();
        let repository = Arc::new(InMemoryLearnerResultRepository::new());
        let config = RunConfig::new(1, 1, alphabet.clone());
        let result = repository
            .create_result(&LearnerResult::new(config))
            .await
            .unwrap();

        let executor = QueryExecutor::new(
            Box::new(ScriptedMealy::new(Arc::new(toggle_target()))),
            &alphabet,
        );
        let (tx, _rx) = watch::channel(RunProgress::new(result.clone()));
        let controller = StepController::new(
            result,
            repository.clone(),
            Box::new(LStar::new(&alphabet)),
            Box::new(SampleOracle::new(eq_words.clone())),
            QueryPipeline::new(executor, true, None),
            RunPlan {
                mode: RunMode::Start,
                eq_oracle: EqOracleConfig::Sample {
                    counter_examples: eq_words,
                },
                budget,
            },
            CancellationToken::new(),
            Arc::new(tx),
        );
        (controller, repository)
    }

    #[tokio::test]
    async fn test_converges_in_one_step() {
        let (controller, repository) = controller(vec![w("a b a b")], StepBudget::UNBOUNDED).await;
        let exit = controller.run().await;

        assert_eq!(exit.outcome.phase, RunPhase::Converged);
        assert_eq!(exit.outcome.steps_performed, 1);
        assert!(exit.learner.is_some());

        let stored = repository.get(1, 1).await.unwrap().unwrap();
        assert_eq!(stored.steps.len(), 1);
        let step = &stored.steps[0];
        assert!(step.counter_example.is_none());
        assert_eq!(step.statistics.mqs_used.learner, 10);
        assert_eq!(step.statistics.eqs_used, 1);
        assert!(step.algorithm_information.contains("ε"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panic: boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "panic: bang");
    }
}
