//! Real-time driver for a [`SessionEngine`].
//!
//! The engine itself never sleeps. `SessionDriver` supplies the one-second
//! cadence, runs evaluator calls as spawned tasks and feeds presentation
//! commands in, all from a single `select!` loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::engine::{NextStep, PendingEvaluation, SessionEngine, SubmissionOutcome, TickOutcome};
use crate::session::{Phase, SubmissionTrigger};
use crate::traits::Evaluation;

/// Input from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    /// The answer field changed.
    Draft(String),
    /// The candidate submitted an answer.
    Submit(String),
    /// Tear the session down.
    Quit,
}

type EvaluationHandle = JoinHandle<anyhow::Result<Evaluation>>;

/// Owns the timer cadence for one session.
#[derive(Debug, Clone)]
pub struct SessionDriver {
    tick_period: Duration,
}

impl Default for SessionDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionDriver {
    pub fn new() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
        }
    }

    /// Override the tick period. Useful for tests and demos.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Run a started session until it reaches a terminal phase.
    ///
    /// Commands are read even while an evaluation is in flight: a second
    /// submission is rejected by the engine rather than queued for the next
    /// question, and `Quit` abandons at once. Closing the channel abandons
    /// the session. An evaluation still running at that point is detached,
    /// and its result is discarded by the engine.
    pub async fn run(
        &self,
        engine: &mut SessionEngine,
        commands: &mut mpsc::Receiver<DriverCommand>,
    ) -> Phase {
        let mut ticker = time::interval_at(Instant::now() + self.tick_period, self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pending: Option<PendingEvaluation> = None;
        let mut task: Option<EvaluationHandle> = None;

        while !engine.is_terminal() {
            tokio::select! {
                joined = join_evaluation(&mut task) => {
                    task = None;
                    let Some(submission) = pending.take() else {
                        continue;
                    };
                    let result = joined
                        .unwrap_or_else(|e| Err(anyhow::anyhow!("evaluation task failed: {e}")));
                    let outcome = engine.complete_submission(submission, result).await;
                    if let SubmissionOutcome::Finalized { next: NextStep::Question(_), .. } = outcome {
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {
                    if let TickOutcome::TimedOut(submission) = engine.tick() {
                        task = Some(tokio::spawn(engine.evaluation_task(&submission)));
                        pending = Some(submission);
                    }
                }
                command = commands.recv() => match command {
                    Some(DriverCommand::Draft(text)) => {
                        if let Err(e) = engine.update_draft(text) {
                            tracing::debug!(error = %e, "draft ignored");
                        }
                    }
                    Some(DriverCommand::Submit(text)) => {
                        // Rejections (blank, in flight) are reported through the observer.
                        if let Ok(submission) = engine.begin_submission(text, SubmissionTrigger::Manual) {
                            task = Some(tokio::spawn(engine.evaluation_task(&submission)));
                            pending = Some(submission);
                        }
                    }
                    Some(DriverCommand::Quit) | None => engine.abandon(),
                },
            }
        }

        engine.phase()
    }
}

async fn join_evaluation(
    task: &mut Option<EvaluationHandle>,
) -> Result<anyhow::Result<Evaluation>, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::EngineConfig;
    use crate::session::OutcomeKind;
    use crate::testing::{candidate, GeneratedSource, ScriptedEvaluator, Step};

    async fn started(evaluator: ScriptedEvaluator) -> SessionEngine {
        let mut engine = SessionEngine::new(
            Arc::new(evaluator),
            Arc::new(GeneratedSource::unlimited()),
            EngineConfig::default(),
        );
        engine.start_session(candidate()).await.unwrap();
        engine
    }

    fn spawn_driver(
        mut engine: SessionEngine,
    ) -> (
        mpsc::Sender<DriverCommand>,
        JoinHandle<(Phase, SessionEngine)>,
    ) {
        let (tx, mut rx) = mpsc::channel(32);
        let handle = tokio::spawn(async move {
            let phase = SessionDriver::new().run(&mut engine, &mut rx).await;
            (phase, engine)
        });
        (tx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn ten_submissions_finish_the_session() {
        let engine = started(ScriptedEvaluator::new(vec![Step::score(0.9); 10])).await;
        let (tx, handle) = spawn_driver(engine);

        for i in 0..10 {
            tx.send(DriverCommand::Submit(format!("answer {i}")))
                .await
                .unwrap();
            time::sleep(Duration::from_millis(10)).await;
        }

        let (phase, engine) = handle.await.unwrap();
        assert_eq!(phase, Phase::Finished);
        assert_eq!(engine.history().len(), 10);
        assert!(engine.result().passed);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_expiry_submits_the_draft() {
        let engine = started(ScriptedEvaluator::new(vec![Step::score(0.1)])).await;
        let (tx, handle) = spawn_driver(engine);

        tx.send(DriverCommand::Draft("half an answer".into()))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(46)).await;
        tx.send(DriverCommand::Quit).await.unwrap();

        let (phase, engine) = handle.await.unwrap();
        assert_eq!(phase, Phase::Abandoned);
        assert_eq!(engine.history().len(), 1);
        let entry = &engine.history()[0];
        assert_eq!(entry.trigger, SubmissionTrigger::Timeout);
        assert_eq!(entry.answer, "half an answer");
        assert_eq!(entry.outcome, OutcomeKind::Fail);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_suppressed_during_slow_evaluation() {
        let evaluator =
            ScriptedEvaluator::new(vec![Step::score(0.9)]).with_delay(Duration::from_secs(20));
        let mut engine = started(evaluator).await;
        // Leave five seconds on the clock before submitting.
        for _ in 0..40 {
            engine.tick();
        }
        let (tx, handle) = spawn_driver(engine);

        tx.send(DriverCommand::Submit("slow but right".into()))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(25)).await;
        tx.send(DriverCommand::Quit).await.unwrap();

        let (_, engine) = handle.await.unwrap();
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.history()[0].trigger, SubmissionTrigger::Manual);
        assert_eq!(engine.history()[0].outcome, OutcomeKind::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_channel_abandons() {
        let engine = started(ScriptedEvaluator::new(vec![])).await;
        let (tx, handle) = spawn_driver(engine);
        drop(tx);

        let (phase, engine) = handle.await.unwrap();
        assert_eq!(phase, Phase::Abandoned);
        assert!(engine.history().is_empty());
        assert!(engine.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_submission_is_ignored() {
        let engine = started(ScriptedEvaluator::new(vec![Step::score(0.9)])).await;
        let (tx, handle) = spawn_driver(engine);

        tx.send(DriverCommand::Submit("  ".into())).await.unwrap();
        tx.send(DriverCommand::Submit("real answer".into()))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(1)).await;
        tx.send(DriverCommand::Quit).await.unwrap();

        let (_, engine) = handle.await.unwrap();
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.history()[0].answer, "real answer");
    }

    #[tokio::test(start_paused = true)]
    async fn submit_during_evaluation_is_rejected_not_queued() {
        let evaluator =
            ScriptedEvaluator::new(vec![Step::score(0.9)]).with_delay(Duration::from_secs(5));
        let engine = started(evaluator).await;
        let first_question = engine.current_question().unwrap().id.clone();
        let (tx, handle) = spawn_driver(engine);

        tx.send(DriverCommand::Submit("first".into())).await.unwrap();
        time::sleep(Duration::from_millis(100)).await;
        tx.send(DriverCommand::Submit("typed while grading".into()))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(10)).await;
        tx.send(DriverCommand::Quit).await.unwrap();

        let (phase, engine) = handle.await.unwrap();
        assert_eq!(phase, Phase::Abandoned);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.history()[0].answer, "first");
        assert_eq!(engine.history()[0].question.id, first_question);
        assert_eq!(engine.snapshot().evaluations_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_during_evaluation_abandons_at_once() {
        let evaluator =
            ScriptedEvaluator::new(vec![Step::score(0.9)]).with_delay(Duration::from_secs(20));
        let engine = started(evaluator).await;
        let (tx, handle) = spawn_driver(engine);

        tx.send(DriverCommand::Submit("an answer".into()))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(1)).await;
        tx.send(DriverCommand::Quit).await.unwrap();

        let started_wait = Instant::now();
        let (phase, engine) = handle.await.unwrap();
        assert!(started_wait.elapsed() < Duration::from_secs(1));
        assert_eq!(phase, Phase::Abandoned);
        assert!(engine.history().is_empty());
        assert!(!engine.is_submission_in_flight());
    }
}
