//! Adaptive interview session engine.
//!
//! `SessionEngine` exclusively owns the session state. It asks the
//! [`QuestionSource`] for questions, hands submissions to the [`Evaluator`],
//! applies the scoring policy from [`crate::scoring`] and publishes an
//! immutable [`SessionSnapshot`] after every mutation.
//!
//! Submissions are split in three steps so a driver can run the evaluator
//! call concurrently with the ticker:
//!
//! 1. [`SessionEngine::begin_submission`] sets the in-flight guard.
//! 2. [`SessionEngine::evaluation_task`] returns a `'static` future calling
//!    the evaluator under `evaluator_timeout`.
//! 3. [`SessionEngine::complete_submission`] applies the result, or discards
//!    it if the session moved on in the meantime.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{ProviderError, SessionError};
use crate::model::{Candidate, Difficulty, Question};
use crate::report::InterviewReport;
use crate::scoring::{
    compute_session_stats, credited_points, earned_points, InterviewResult, Outcome,
    EVALUATION_FAILED_FEEDBACK, MAX_QUESTIONS,
};
use crate::session::{
    FollowUpTurn, HistoryEntry, OutcomeKind, Phase, SessionSnapshot, SubmissionTrigger,
};
use crate::timer::{QuestionTimer, Tick};
use crate::traits::{Evaluation, EvaluationRequest, Evaluator, QuestionRequest, QuestionSource};

/// Tunables for the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on a single evaluator call.
    pub evaluator_timeout: Duration,
    /// Follow-up rounds allowed per question before a partial answer fails.
    /// `u32::MAX` leaves follow-ups uncapped.
    pub max_follow_ups: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluator_timeout: Duration::from_secs(30),
            max_follow_ups: 1,
        }
    }
}

/// Session progress callbacks for the presentation layer.
pub trait SessionObserver: Send + Sync {
    fn on_question(&self, question: &Question, number: u32, time_budget_secs: u32);
    fn on_tick(&self, remaining_secs: u32);
    fn on_follow_up(&self, prompt: &str, feedback: &str);
    fn on_answer_finalized(&self, entry: &HistoryEntry);
    fn on_finished(&self, result: &InterviewResult);
    fn on_failed(&self, reason: &str);
    /// A submission was refused. The session is unchanged.
    fn on_rejected(&self, _error: &SessionError) {}
}

/// No-op session observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_question(&self, _: &Question, _: u32, _: u32) {}
    fn on_tick(&self, _: u32) {}
    fn on_follow_up(&self, _: &str, _: &str) {}
    fn on_answer_finalized(&self, _: &HistoryEntry) {}
    fn on_finished(&self, _: &InterviewResult) {}
    fn on_failed(&self, _: &str) {}
}

/// A submission waiting for its evaluation.
#[derive(Debug, Clone)]
pub struct PendingEvaluation {
    id: u64,
    trigger: SubmissionTrigger,
    request: EvaluationRequest,
}

impl PendingEvaluation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn trigger(&self) -> SubmissionTrigger {
        self.trigger
    }

    pub fn request(&self) -> &EvaluationRequest {
        &self.request
    }
}

/// What happens after a question is finalized.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    /// A new question is active.
    Question(Question),
    /// The last question was answered.
    Finished(InterviewResult),
    /// No next question could be obtained.
    Failed(String),
}

/// Result of applying an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The question was finalized and appended to history.
    Finalized { entry: HistoryEntry, next: NextStep },
    /// The answer earned a follow-up on the same question.
    FollowUp {
        prompt: String,
        feedback: String,
        evaluation_score: f64,
    },
    /// The result arrived for a stale submission and was dropped.
    Discarded,
}

/// Result of a once-per-second tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Nothing to count down.
    Idle,
    /// An evaluation is in flight.
    Suppressed,
    /// Seconds left on the active question.
    Counting(u32),
    /// Time ran out; the current draft was submitted.
    TimedOut(PendingEvaluation),
}

#[derive(Debug, Default)]
struct SessionState {
    phase: Phase,
    candidate: Option<Candidate>,
    difficulty: Difficulty,
    questions_asked: u32,
    score: u32,
    current_question: Option<Question>,
    follow_up_question: Option<String>,
    answer_draft: String,
    history: Vec<HistoryEntry>,
    /// Rounds already played on the current question.
    follow_up_turns: Vec<FollowUpTurn>,
    asked_ids: Vec<String>,
    in_flight: Option<u64>,
    evaluations_completed: u64,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// Drives one interview session.
pub struct SessionEngine {
    session_id: Uuid,
    evaluator: Arc<dyn Evaluator>,
    questions: Arc<dyn QuestionSource>,
    observer: Arc<dyn SessionObserver>,
    config: EngineConfig,
    state: SessionState,
    timer: QuestionTimer,
    next_submission_id: u64,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionEngine {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        questions: Arc<dyn QuestionSource>,
        config: EngineConfig,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let state = SessionState::default();
        let timer = QuestionTimer::new();
        let (snapshots, _) = watch::channel(build_snapshot(session_id, &state, &timer));
        Self {
            session_id,
            evaluator,
            questions,
            observer: Arc::new(NoopObserver),
            config,
            state,
            timer,
            next_submission_id: 1,
            snapshots,
        }
    }

    /// Attach a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.state.phase.is_terminal()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.state.difficulty
    }

    pub fn score(&self) -> u32 {
        self.state.score
    }

    pub fn questions_asked(&self) -> u32 {
        self.state.questions_asked
    }

    pub fn time_remaining(&self) -> u32 {
        self.timer.remaining()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.state.current_question.as_ref()
    }

    pub fn follow_up_question(&self) -> Option<&str> {
        self.state.follow_up_question.as_deref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    pub fn evaluator_name(&self) -> &str {
        self.evaluator.name()
    }

    pub fn is_submission_in_flight(&self) -> bool {
        self.state.in_flight.is_some()
    }

    /// Current verdict for the running score.
    pub fn result(&self) -> InterviewResult {
        InterviewResult::from_score(self.state.score)
    }

    /// Immutable view of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        build_snapshot(self.session_id, &self.state, &self.timer)
    }

    /// Receive a fresh snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Build an exportable report of the session so far.
    pub fn report(&self) -> InterviewReport {
        let started = self.state.started_at.unwrap_or_else(Utc::now);
        let ended = self.state.ended_at.unwrap_or_else(Utc::now);
        InterviewReport {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            created_at: Utc::now(),
            candidate: self.state.candidate.clone(),
            evaluator: self.evaluator.name().to_string(),
            phase: self.state.phase,
            result: self.result(),
            stats: compute_session_stats(&self.state.history),
            history: self.state.history.clone(),
            error: self.state.error.clone(),
            duration_ms: (ended - started).num_milliseconds().max(0) as u64,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the interview and present the first question at `Easy`.
    #[tracing::instrument(skip_all, fields(session = %self.session_id))]
    pub async fn start_session(&mut self, candidate: Candidate) -> Result<(), SessionError> {
        if self.state.phase != Phase::Welcome {
            return Err(SessionError::AlreadyStarted(self.state.phase));
        }
        candidate
            .validate()
            .map_err(SessionError::InvalidCandidate)?;

        tracing::info!(role = %candidate.role, "session started");
        self.state.candidate = Some(candidate);
        self.state.phase = Phase::Interviewing;
        self.state.difficulty = Difficulty::Easy;
        self.state.score = 0;
        self.state.questions_asked = 0;
        self.state.history.clear();
        self.state.started_at = Some(Utc::now());

        match self.fetch_question().await {
            Ok(question) => {
                self.present(question);
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Tear the session down. Any in-flight evaluation is left running and
    /// its result will be discarded.
    pub fn abandon(&mut self) {
        if self.is_terminal() {
            return;
        }
        tracing::info!(session = %self.session_id, "session abandoned");
        self.state.phase = Phase::Abandoned;
        self.state.in_flight = None;
        self.state.ended_at = Some(Utc::now());
        self.timer.stop();
        self.publish();
    }

    // -----------------------------------------------------------------------
    // Answering
    // -----------------------------------------------------------------------

    /// Record the text currently in the answer field.
    pub fn update_draft(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.state.phase != Phase::Interviewing {
            return Err(SessionError::NotInterviewing(self.state.phase));
        }
        self.state.answer_draft = text.into();
        Ok(())
    }

    /// Submit an answer and wait for its evaluation.
    pub async fn submit_answer(
        &mut self,
        text: impl Into<String>,
    ) -> Result<SubmissionOutcome, SessionError> {
        let pending = self.begin_submission(text, SubmissionTrigger::Manual)?;
        Ok(self.resolve(pending).await)
    }

    /// Evaluate a pending submission inline and apply the result.
    pub async fn resolve(&mut self, pending: PendingEvaluation) -> SubmissionOutcome {
        let result = self.evaluation_task(&pending).await;
        self.complete_submission(pending, result).await
    }

    /// Validate a submission and mark it in flight.
    pub fn begin_submission(
        &mut self,
        text: impl Into<String>,
        trigger: SubmissionTrigger,
    ) -> Result<PendingEvaluation, SessionError> {
        let text = text.into();
        match self.check_submission(&text, trigger) {
            Ok(question) => {
                let id = self.next_submission_id;
                self.next_submission_id += 1;
                self.state.in_flight = Some(id);
                self.state.answer_draft = text.clone();

                let role = self
                    .state
                    .candidate
                    .as_ref()
                    .map(|c| c.role.clone())
                    .unwrap_or_default();
                let pending = PendingEvaluation {
                    id,
                    trigger,
                    request: EvaluationRequest {
                        question,
                        answer: text,
                        follow_up_prompt: self.state.follow_up_question.clone(),
                        role,
                    },
                };
                tracing::debug!(submission = id, ?trigger, "submission started");
                self.publish();
                Ok(pending)
            }
            Err(e) => {
                tracing::debug!(error = %e, "submission rejected");
                self.observer.on_rejected(&e);
                Err(e)
            }
        }
    }

    fn check_submission(
        &self,
        text: &str,
        trigger: SubmissionTrigger,
    ) -> Result<Question, SessionError> {
        if self.state.phase != Phase::Interviewing {
            return Err(SessionError::NotInterviewing(self.state.phase));
        }
        if self.state.in_flight.is_some() {
            return Err(SessionError::SubmissionInFlight);
        }
        let question = self
            .state
            .current_question
            .clone()
            .ok_or(SessionError::NoActiveQuestion)?;
        if trigger == SubmissionTrigger::Manual && text.trim().is_empty() {
            return Err(SessionError::EmptyAnswer);
        }
        Ok(question)
    }

    /// Future that calls the evaluator for `pending`.
    ///
    /// Panics and calls exceeding `evaluator_timeout` resolve to errors.
    pub fn evaluation_task(
        &self,
        pending: &PendingEvaluation,
    ) -> BoxFuture<'static, anyhow::Result<Evaluation>> {
        let evaluator = Arc::clone(&self.evaluator);
        let request = pending.request.clone();
        let limit = self.config.evaluator_timeout;

        async move {
            let call = AssertUnwindSafe(async move { evaluator.evaluate(&request).await });
            match tokio::time::timeout(limit, call.catch_unwind()).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(anyhow::anyhow!("evaluator panicked")),
                Err(_) => Err(ProviderError::Timeout(limit.as_secs()).into()),
            }
        }
        .boxed()
    }

    /// Apply an evaluation result to the session.
    #[tracing::instrument(skip_all, fields(session = %self.session_id, submission = pending.id))]
    pub async fn complete_submission(
        &mut self,
        pending: PendingEvaluation,
        result: anyhow::Result<Evaluation>,
    ) -> SubmissionOutcome {
        if self.state.phase != Phase::Interviewing || self.state.in_flight != Some(pending.id) {
            tracing::debug!(phase = %self.state.phase, "discarding stale evaluation");
            return SubmissionOutcome::Discarded;
        }
        self.state.in_flight = None;
        self.state.evaluations_completed += 1;

        let (evaluation, evaluation_failed) = match result.map(Evaluation::normalized) {
            Ok(Some(evaluation)) => (evaluation, false),
            Ok(None) => {
                tracing::warn!("evaluator returned a non-finite score");
                (failed_evaluation(), true)
            }
            Err(e) => {
                match e.downcast_ref::<ProviderError>() {
                    Some(provider) if provider.is_permanent() => {
                        tracing::error!(error = %provider, "evaluator rejected the request")
                    }
                    _ => tracing::warn!(error = %e, "evaluation failed"),
                }
                (failed_evaluation(), true)
            }
        };

        let difficulty = self.state.difficulty;
        let points_earned = earned_points(evaluation.score, difficulty);

        let outcome = match Outcome::classify(&evaluation) {
            Outcome::FollowUp(_) if pending.trigger == SubmissionTrigger::Timeout => Outcome::Fail,
            Outcome::FollowUp(_)
                if self.state.follow_up_turns.len() as u32 >= self.config.max_follow_ups =>
            {
                Outcome::Fail
            }
            other => other,
        };

        tracing::info!(
            score = evaluation.score,
            points_earned,
            ?outcome,
            "answer evaluated"
        );

        let kind = match outcome {
            Outcome::FollowUp(prompt) => {
                self.state.follow_up_turns.push(FollowUpTurn {
                    answer: pending.request.answer,
                    evaluation_score: evaluation.score,
                    points_earned,
                    feedback: evaluation.feedback.clone(),
                    prompt: prompt.clone(),
                    evaluation_failed,
                });
                self.state.follow_up_question = Some(prompt.clone());
                self.state.answer_draft.clear();
                self.observer.on_follow_up(&prompt, &evaluation.feedback);
                self.publish();
                return SubmissionOutcome::FollowUp {
                    prompt,
                    feedback: evaluation.feedback,
                    evaluation_score: evaluation.score,
                };
            }
            Outcome::Pass => OutcomeKind::Pass,
            Outcome::Fail => OutcomeKind::Fail,
        };

        self.state.score += credited_points(kind, difficulty);
        self.state.difficulty = match kind {
            OutcomeKind::Pass => difficulty.raise(),
            OutcomeKind::Fail => difficulty.lower(),
        };

        let entry = HistoryEntry {
            question: pending.request.question,
            answer: pending.request.answer,
            difficulty,
            question_points: difficulty.points(),
            evaluation_score: evaluation.score,
            points_earned,
            feedback: evaluation.feedback,
            outcome: kind,
            trigger: pending.trigger,
            follow_up_prompt: pending.request.follow_up_prompt,
            follow_ups: std::mem::take(&mut self.state.follow_up_turns),
            evaluation_failed,
            answered_at: Utc::now(),
        };
        self.state.history.push(entry.clone());
        self.state.questions_asked += 1;
        self.observer.on_answer_finalized(&entry);

        let next = self.advance().await;
        SubmissionOutcome::Finalized { entry, next }
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    /// Once-per-second callback. Submits the current draft when time runs out.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state.phase != Phase::Interviewing || self.state.current_question.is_none() {
            return TickOutcome::Idle;
        }
        if self.state.in_flight.is_some() {
            return TickOutcome::Suppressed;
        }

        match self.timer.tick() {
            Tick::Inactive => TickOutcome::Idle,
            Tick::Remaining(remaining) => {
                self.observer.on_tick(remaining);
                self.publish();
                TickOutcome::Counting(remaining)
            }
            Tick::Expired => {
                self.observer.on_tick(0);
                tracing::info!(session = %self.session_id, "question timed out");
                let draft = self.state.answer_draft.clone();
                match self.begin_submission(draft, SubmissionTrigger::Timeout) {
                    Ok(pending) => TickOutcome::TimedOut(pending),
                    Err(e) => {
                        tracing::warn!(error = %e, "timeout submission refused");
                        self.publish();
                        TickOutcome::Idle
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn advance(&mut self) -> NextStep {
        self.state.current_question = None;
        self.state.follow_up_question = None;
        self.state.answer_draft.clear();
        self.timer.stop();

        if self.state.questions_asked >= MAX_QUESTIONS {
            let result = self.result();
            tracing::info!(
                score = result.score,
                percentage = result.percentage,
                passed = result.passed,
                "session finished"
            );
            self.state.phase = Phase::Finished;
            self.state.ended_at = Some(Utc::now());
            self.observer.on_finished(&result);
            self.publish();
            return NextStep::Finished(result);
        }

        match self.fetch_question().await {
            Ok(question) => {
                self.present(question.clone());
                NextStep::Question(question)
            }
            Err(e) => {
                self.fail(&e);
                NextStep::Failed(e.to_string())
            }
        }
    }

    async fn fetch_question(&self) -> Result<Question, SessionError> {
        let difficulty = self.state.difficulty;
        let request = QuestionRequest {
            role: self
                .state
                .candidate
                .as_ref()
                .map(|c| c.role.clone())
                .unwrap_or_default(),
            difficulty,
            exclude: self.state.asked_ids.clone(),
        };
        match self.questions.next_question(&request).await {
            Ok(Some(question)) => Ok(question),
            Ok(None) => Err(SessionError::QuestionsExhausted(difficulty)),
            Err(e) => Err(SessionError::QuestionSource(format!("{e:#}"))),
        }
    }

    fn present(&mut self, question: Question) {
        let budget = self.state.difficulty.time_budget_secs();
        tracing::debug!(
            question = %question.id,
            difficulty = %self.state.difficulty,
            "presenting question"
        );
        self.state.asked_ids.push(question.id.clone());
        self.timer.start(budget);
        self.observer
            .on_question(&question, self.state.questions_asked + 1, budget);
        self.state.current_question = Some(question);
        self.publish();
    }

    fn fail(&mut self, error: &SessionError) {
        tracing::error!(session = %self.session_id, error = %error, "session failed");
        self.state.phase = Phase::Failed;
        self.state.error = Some(error.to_string());
        self.state.current_question = None;
        self.state.in_flight = None;
        self.state.ended_at = Some(Utc::now());
        self.timer.stop();
        self.observer.on_failed(&error.to_string());
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

fn failed_evaluation() -> Evaluation {
    Evaluation {
        score: 0.0,
        feedback: EVALUATION_FAILED_FEEDBACK.to_string(),
        follow_up: None,
    }
}

fn build_snapshot(session_id: Uuid, state: &SessionState, timer: &QuestionTimer) -> SessionSnapshot {
    SessionSnapshot {
        session_id,
        phase: state.phase,
        candidate: state.candidate.clone(),
        difficulty: state.difficulty,
        questions_asked: state.questions_asked,
        max_questions: MAX_QUESTIONS,
        score: state.score,
        current_question: state.current_question.clone(),
        follow_up_question: state.follow_up_question.clone(),
        time_remaining: timer.remaining(),
        history: state.history.clone(),
        is_submission_in_flight: state.in_flight.is_some(),
        evaluations_completed: state.evaluations_completed,
        error: state.error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candidate, GeneratedSource, ScriptedEvaluator, Step};

    fn engine_with(steps: Vec<Step>) -> (SessionEngine, Arc<ScriptedEvaluator>, Arc<GeneratedSource>) {
        engine_with_config(steps, EngineConfig::default())
    }

    fn engine_with_config(
        steps: Vec<Step>,
        config: EngineConfig,
    ) -> (SessionEngine, Arc<ScriptedEvaluator>, Arc<GeneratedSource>) {
        let evaluator = Arc::new(ScriptedEvaluator::new(steps));
        let source = Arc::new(GeneratedSource::unlimited());
        let engine = SessionEngine::new(evaluator.clone(), source.clone(), config);
        (engine, evaluator, source)
    }

    fn finalized(outcome: SubmissionOutcome) -> (HistoryEntry, NextStep) {
        match outcome {
            SubmissionOutcome::Finalized { entry, next } => (entry, next),
            other => panic!("expected a finalized answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_presents_easy_question_with_full_budget() {
        let (mut engine, _, source) = engine_with(vec![]);
        engine.start_session(candidate()).await.unwrap();

        assert_eq!(engine.phase(), Phase::Interviewing);
        assert_eq!(engine.difficulty(), Difficulty::Easy);
        assert_eq!(engine.time_remaining(), 45);
        assert_eq!(engine.questions_asked(), 0);
        assert_eq!(source.requests().len(), 1);
        assert_eq!(source.requests()[0].difficulty, Difficulty::Easy);
        assert_eq!(source.requests()[0].role, "Software Developer");
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (mut engine, _, _) = engine_with(vec![]);
        engine.start_session(candidate()).await.unwrap();
        let err = engine.start_session(candidate()).await.unwrap_err();
        assert_eq!(err, SessionError::AlreadyStarted(Phase::Interviewing));
    }

    #[tokio::test]
    async fn invalid_candidate_is_rejected() {
        let (mut engine, _, _) = engine_with(vec![]);
        let mut c = candidate();
        c.email = String::new();
        let err = engine.start_session(c).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidCandidate(_)));
        assert_eq!(engine.phase(), Phase::Welcome);
    }

    #[tokio::test]
    async fn pass_credits_full_points_and_raises_difficulty() {
        let (mut engine, _, _) = engine_with(vec![Step::score(0.8)]);
        engine.start_session(candidate()).await.unwrap();

        let (entry, next) = finalized(engine.submit_answer("ownership moves").await.unwrap());
        assert!((entry.points_earned - 4.0).abs() < 1e-9);
        assert_eq!(entry.question_points, 5);
        assert_eq!(entry.outcome, OutcomeKind::Pass);
        assert_eq!(entry.trigger, SubmissionTrigger::Manual);
        assert!(matches!(next, NextStep::Question(ref q) if q.difficulty == Difficulty::Medium));

        assert_eq!(engine.score(), 5);
        assert_eq!(engine.difficulty(), Difficulty::Medium);
        assert_eq!(engine.questions_asked(), 1);
        assert_eq!(engine.time_remaining(), 60);
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn follow_up_keeps_question_and_timer() {
        let (mut engine, evaluator, source) =
            engine_with(vec![Step::follow_up(0.5, "Can you give an example?"), Step::score(0.8)]);
        engine.start_session(candidate()).await.unwrap();
        for _ in 0..5 {
            engine.tick();
        }
        assert_eq!(engine.time_remaining(), 40);
        let first_question = engine.current_question().cloned().unwrap();

        let outcome = engine.submit_answer("partially right").await.unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::FollowUp {
                prompt: "Can you give an example?".into(),
                feedback: "scripted".into(),
                evaluation_score: 0.5,
            }
        );
        assert_eq!(engine.questions_asked(), 0);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.difficulty(), Difficulty::Easy);
        assert_eq!(engine.time_remaining(), 40);
        assert_eq!(engine.follow_up_question(), Some("Can you give an example?"));
        assert_eq!(engine.current_question(), Some(&first_question));
        assert!(engine.history().is_empty());
        assert_eq!(source.requests().len(), 1);

        let (entry, _) = finalized(engine.submit_answer("here is an example").await.unwrap());
        assert_eq!(entry.question, first_question);
        assert_eq!(entry.follow_up_prompt.as_deref(), Some("Can you give an example?"));
        assert_eq!(entry.follow_ups.len(), 1);
        assert_eq!(entry.follow_ups[0].answer, "partially right");
        assert_eq!(engine.questions_asked(), 1);
        assert_eq!(engine.follow_up_question(), None);

        let second = evaluator.requests();
        assert_eq!(
            second[1].follow_up_prompt.as_deref(),
            Some("Can you give an example?")
        );
    }

    #[tokio::test]
    async fn second_partial_answer_collapses_to_fail() {
        let (mut engine, _, _) = engine_with(vec![
            Step::follow_up(0.5, "More detail?"),
            Step::follow_up(0.6, "Even more?"),
        ]);
        engine.start_session(candidate()).await.unwrap();
        engine.submit_answer("partial").await.unwrap();

        let (entry, _) = finalized(engine.submit_answer("still partial").await.unwrap());
        assert_eq!(entry.outcome, OutcomeKind::Fail);
        assert!((entry.points_earned - 3.0).abs() < 1e-9);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.questions_asked(), 1);
    }

    #[tokio::test]
    async fn uncapped_follow_ups_keep_asking() {
        let config = EngineConfig {
            max_follow_ups: u32::MAX,
            ..EngineConfig::default()
        };
        let (mut engine, _, _) = engine_with_config(
            vec![
                Step::follow_up(0.5, "More detail?"),
                Step::follow_up(0.6, "Even more?"),
                Step::score(0.9),
            ],
            config,
        );
        engine.start_session(candidate()).await.unwrap();
        engine.submit_answer("partial").await.unwrap();

        let outcome = engine.submit_answer("still partial").await.unwrap();
        assert!(matches!(outcome, SubmissionOutcome::FollowUp { ref prompt, .. } if prompt == "Even more?"));
        assert_eq!(engine.questions_asked(), 0);

        let (entry, _) = finalized(engine.submit_answer("complete").await.unwrap());
        assert_eq!(entry.outcome, OutcomeKind::Pass);
        assert_eq!(entry.follow_ups.len(), 2);
        assert_eq!(engine.score(), 5);
    }

    #[tokio::test]
    async fn consecutive_fails_from_hard_bottom_out_at_easy() {
        let mut steps = vec![Step::score(0.9); 2];
        steps.extend(vec![Step::score(0.0); 3]);
        let (mut engine, _, source) = engine_with(steps);
        engine.start_session(candidate()).await.unwrap();
        engine.submit_answer("right").await.unwrap();
        engine.submit_answer("right").await.unwrap();
        assert_eq!(engine.difficulty(), Difficulty::Hard);

        let mut levels = Vec::new();
        for _ in 0..3 {
            let (entry, _) = finalized(engine.submit_answer("wrong").await.unwrap());
            assert_eq!(entry.outcome, OutcomeKind::Fail);
            levels.push(engine.difficulty());
        }
        assert_eq!(
            levels,
            vec![Difficulty::Medium, Difficulty::Easy, Difficulty::Easy]
        );
        assert_eq!(engine.time_remaining(), 45);
        assert_eq!(engine.score(), 15);
        assert_eq!(source.requests().last().unwrap().difficulty, Difficulty::Easy);
    }

    #[tokio::test]
    async fn partial_without_prompt_fails() {
        let (mut engine, _, _) = engine_with(vec![Step::score(0.5)]);
        engine.start_session(candidate()).await.unwrap();
        let (entry, _) = finalized(engine.submit_answer("meh").await.unwrap());
        assert_eq!(entry.outcome, OutcomeKind::Fail);
    }

    #[tokio::test]
    async fn fail_lowers_difficulty_with_floor() {
        let (mut engine, _, _) =
            engine_with(vec![Step::score(0.9), Step::score(0.1), Step::score(0.1)]);
        engine.start_session(candidate()).await.unwrap();
        engine.submit_answer("good").await.unwrap();
        assert_eq!(engine.difficulty(), Difficulty::Medium);

        let (entry, _) = finalized(engine.submit_answer("wrong").await.unwrap());
        assert!((entry.points_earned - 1.0).abs() < 1e-9);
        assert_eq!(engine.difficulty(), Difficulty::Easy);
        assert_eq!(engine.questions_asked(), 2);
        assert_eq!(engine.time_remaining(), 45);

        engine.submit_answer("wrong again").await.unwrap();
        assert_eq!(engine.difficulty(), Difficulty::Easy);
        assert_eq!(engine.score(), 5);
    }

    #[tokio::test]
    async fn tenth_answer_finishes_without_eleventh_request() {
        let (mut engine, _, source) = engine_with(vec![Step::score(1.0); 10]);
        engine.start_session(candidate()).await.unwrap();

        let mut last = None;
        for i in 0..10 {
            last = Some(engine.submit_answer(format!("answer {i}")).await.unwrap());
        }
        let (_, next) = finalized(last.unwrap());
        // 5 + 10 + 15 * 8
        let expected = InterviewResult::from_score(135);
        assert_eq!(next, NextStep::Finished(expected));

        assert_eq!(engine.phase(), Phase::Finished);
        assert_eq!(engine.questions_asked(), 10);
        assert_eq!(engine.history().len(), 10);
        assert_eq!(source.requests().len(), 10);
        assert!(engine.result().passed);

        let err = engine.submit_answer("one more").await.unwrap_err();
        assert_eq!(err, SessionError::NotInterviewing(Phase::Finished));
        assert!(matches!(engine.tick(), TickOutcome::Idle));
    }

    #[tokio::test]
    async fn questions_are_never_repeated() {
        let (mut engine, _, source) = engine_with(vec![Step::score(0.0); 3]);
        engine.start_session(candidate()).await.unwrap();
        for _ in 0..3 {
            engine.submit_answer("x").await.unwrap();
        }
        let requests = source.requests();
        assert_eq!(requests[3].exclude.len(), 3);
        let ids: Vec<_> = engine.history().iter().map(|h| h.question.id.clone()).collect();
        assert_eq!(requests[3].exclude, ids);
    }

    #[tokio::test]
    async fn blank_manual_answer_is_rejected() {
        let (mut engine, evaluator, _) = engine_with(vec![]);
        engine.start_session(candidate()).await.unwrap();
        let before = engine.snapshot();

        let err = engine.submit_answer("   ").await.unwrap_err();
        assert_eq!(err, SessionError::EmptyAnswer);
        assert_eq!(engine.snapshot(), before);
        assert_eq!(evaluator.calls(), 0);
    }

    #[tokio::test]
    async fn second_submission_while_in_flight_is_rejected() {
        let (mut engine, _, _) = engine_with(vec![Step::score(0.9)]);
        engine.start_session(candidate()).await.unwrap();

        let pending = engine
            .begin_submission("first", SubmissionTrigger::Manual)
            .unwrap();
        assert!(engine.is_submission_in_flight());
        let err = engine
            .begin_submission("second", SubmissionTrigger::Manual)
            .unwrap_err();
        assert_eq!(err, SessionError::SubmissionInFlight);
        assert!(matches!(engine.tick(), TickOutcome::Suppressed));

        let outcome = engine.resolve(pending).await;
        assert!(matches!(outcome, SubmissionOutcome::Finalized { .. }));
        assert!(!engine.is_submission_in_flight());
    }

    #[tokio::test]
    async fn timer_expiry_submits_draft_exactly_once() {
        let (mut engine, evaluator, _) = engine_with(vec![Step::score(0.9)]);
        engine.start_session(candidate()).await.unwrap();
        engine.update_draft("half typed").unwrap();

        for expected in (1..45).rev() {
            match engine.tick() {
                TickOutcome::Counting(left) => assert_eq!(left, expected),
                other => panic!("unexpected tick outcome {other:?}"),
            }
        }
        let pending = match engine.tick() {
            TickOutcome::TimedOut(pending) => pending,
            other => panic!("expected timeout, got {other:?}"),
        };
        assert_eq!(engine.time_remaining(), 0);
        assert_eq!(pending.trigger(), SubmissionTrigger::Timeout);
        assert_eq!(pending.request().answer, "half typed");

        // Further ticks while evaluating do nothing.
        for _ in 0..3 {
            assert!(matches!(engine.tick(), TickOutcome::Suppressed));
        }

        let (entry, _) = finalized(engine.resolve(pending).await);
        assert_eq!(entry.trigger, SubmissionTrigger::Timeout);
        assert_eq!(entry.outcome, OutcomeKind::Pass);
        assert_eq!(evaluator.calls(), 1);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.time_remaining(), 60);
    }

    #[tokio::test]
    async fn empty_draft_is_submitted_on_timeout() {
        let (mut engine, evaluator, _) = engine_with(vec![Step::score(0.0)]);
        engine.start_session(candidate()).await.unwrap();
        let pending = loop {
            if let TickOutcome::TimedOut(pending) = engine.tick() {
                break pending;
            }
        };
        let (entry, _) = finalized(engine.resolve(pending).await);
        assert_eq!(entry.answer, "");
        assert_eq!(evaluator.requests()[0].answer, "");
    }

    #[tokio::test]
    async fn timeout_follow_up_collapses_to_fail() {
        let (mut engine, _, _) = engine_with(vec![Step::follow_up(0.5, "Go on?")]);
        engine.start_session(candidate()).await.unwrap();
        let pending = loop {
            if let TickOutcome::TimedOut(pending) = engine.tick() {
                break pending;
            }
        };
        let (entry, _) = finalized(engine.resolve(pending).await);
        assert_eq!(entry.outcome, OutcomeKind::Fail);
        assert_eq!(engine.follow_up_question(), None);
    }

    #[tokio::test]
    async fn evaluator_error_scores_as_fail() {
        let (mut engine, _, _) = engine_with(vec![Step::Error]);
        engine.start_session(candidate()).await.unwrap();

        let (entry, _) = finalized(engine.submit_answer("anything").await.unwrap());
        assert_eq!(entry.outcome, OutcomeKind::Fail);
        assert_eq!(entry.feedback, EVALUATION_FAILED_FEEDBACK);
        assert!(entry.evaluation_failed);
        assert_eq!(entry.evaluation_score, 0.0);
        assert!(!engine.is_submission_in_flight());
        assert_eq!(engine.phase(), Phase::Interviewing);
    }

    #[tokio::test]
    async fn evaluator_panic_scores_as_fail() {
        let (mut engine, _, _) = engine_with(vec![Step::Panic]);
        engine.start_session(candidate()).await.unwrap();
        let (entry, _) = finalized(engine.submit_answer("anything").await.unwrap());
        assert!(entry.evaluation_failed);
        assert!(!engine.is_submission_in_flight());
    }

    #[tokio::test]
    async fn non_finite_score_scores_as_fail() {
        let (mut engine, _, _) = engine_with(vec![Step::score(f64::NAN)]);
        engine.start_session(candidate()).await.unwrap();
        let (entry, _) = finalized(engine.submit_answer("anything").await.unwrap());
        assert!(entry.evaluation_failed);
        assert_eq!(entry.outcome, OutcomeKind::Fail);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_evaluator_times_out() {
        let config = EngineConfig {
            evaluator_timeout: Duration::from_secs(5),
            ..EngineConfig::default()
        };
        let (mut engine, _, _) = engine_with_config(vec![Step::Hang], config);
        engine.start_session(candidate()).await.unwrap();
        let (entry, _) = finalized(engine.submit_answer("anything").await.unwrap());
        assert!(entry.evaluation_failed);
        assert_eq!(entry.feedback, EVALUATION_FAILED_FEEDBACK);
    }

    #[tokio::test]
    async fn scores_out_of_range_are_clamped() {
        let (mut engine, _, _) = engine_with(vec![Step::score(1.4)]);
        engine.start_session(candidate()).await.unwrap();
        let (entry, _) = finalized(engine.submit_answer("overachiever").await.unwrap());
        assert_eq!(entry.evaluation_score, 1.0);
        assert!((entry.points_earned - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn late_result_after_abandon_is_discarded() {
        let (mut engine, _, _) = engine_with(vec![Step::score(0.9)]);
        engine.start_session(candidate()).await.unwrap();

        let pending = engine
            .begin_submission("answer", SubmissionTrigger::Manual)
            .unwrap();
        let task = engine.evaluation_task(&pending);
        engine.abandon();
        assert_eq!(engine.phase(), Phase::Abandoned);

        let result = task.await;
        let outcome = engine.complete_submission(pending, result).await;
        assert_eq!(outcome, SubmissionOutcome::Discarded);
        assert_eq!(engine.score(), 0);
        assert!(engine.history().is_empty());
        assert!(matches!(engine.tick(), TickOutcome::Idle));
    }

    #[tokio::test]
    async fn mismatched_submission_is_discarded() {
        let (mut engine, _, _) = engine_with(vec![Step::score(0.9), Step::score(0.9)]);
        engine.start_session(candidate()).await.unwrap();
        let stale = engine
            .begin_submission("first", SubmissionTrigger::Manual)
            .unwrap();
        let stale_copy = stale.clone();
        engine.resolve(stale).await;

        let outcome = engine
            .complete_submission(
                stale_copy,
                Ok(Evaluation {
                    score: 1.0,
                    feedback: String::new(),
                    follow_up: None,
                }),
            )
            .await;
        assert_eq!(outcome, SubmissionOutcome::Discarded);
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_source_at_start_fails_session() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![]));
        let source = Arc::new(GeneratedSource::limited(0));
        let mut engine = SessionEngine::new(evaluator, source, EngineConfig::default());

        let err = engine.start_session(candidate()).await.unwrap_err();
        assert_eq!(err, SessionError::QuestionsExhausted(Difficulty::Easy));
        assert_eq!(engine.phase(), Phase::Failed);
        assert!(engine.snapshot().error.is_some());
    }

    #[tokio::test]
    async fn exhausted_source_mid_session_fails_session() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![Step::score(0.9)]));
        let source = Arc::new(GeneratedSource::limited(1));
        let mut engine = SessionEngine::new(evaluator, source, EngineConfig::default());
        engine.start_session(candidate()).await.unwrap();

        let (_, next) = finalized(engine.submit_answer("good").await.unwrap());
        assert!(matches!(next, NextStep::Failed(_)));
        assert_eq!(engine.phase(), Phase::Failed);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.questions_asked(), 1);
    }

    #[tokio::test]
    async fn snapshots_are_published() {
        let (mut engine, _, _) = engine_with(vec![Step::score(0.9)]);
        let mut rx = engine.subscribe();
        assert_eq!(rx.borrow().phase, Phase::Welcome);

        engine.start_session(candidate()).await.unwrap();
        assert!(rx.has_changed().unwrap());
        {
            let snap = rx.borrow_and_update();
            assert_eq!(snap.phase, Phase::Interviewing);
            assert_eq!(snap.time_remaining, 45);
            assert_eq!(snap.max_questions, MAX_QUESTIONS);
        }

        engine.tick();
        assert_eq!(rx.borrow_and_update().time_remaining, 44);

        engine.submit_answer("answer").await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.score, 5);
        assert_eq!(snap.history.len() as u32, snap.questions_asked);
        assert!(!snap.is_submission_in_flight);
    }

    #[tokio::test]
    async fn report_reflects_session() {
        let (mut engine, _, _) = engine_with(vec![Step::score(0.9), Step::score(0.2)]);
        engine.start_session(candidate()).await.unwrap();
        engine.submit_answer("a").await.unwrap();
        engine.submit_answer("b").await.unwrap();
        engine.abandon();

        let report = engine.report();
        assert_eq!(report.session_id, engine.session_id());
        assert_eq!(report.phase, Phase::Abandoned);
        assert_eq!(report.evaluator, "scripted");
        assert_eq!(report.stats.answered, 2);
        assert_eq!(report.stats.passed, 1);
        assert_eq!(report.result.score, 5);
    }
}
