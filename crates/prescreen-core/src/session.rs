//! Session state types shared between the engine and its observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::model::{Candidate, Difficulty, Question};

/// Lifecycle phase of a session.
///
/// `Welcome → Interviewing → Finished`, with `Failed` and `Abandoned` as
/// terminal side exits. There is no transition back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Welcome,
    Interviewing,
    Finished,
    Failed,
    Abandoned,
}

impl Phase {
    /// No further mutation is possible in a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Failed | Phase::Abandoned)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Welcome => "welcome",
            Phase::Interviewing => "interviewing",
            Phase::Finished => "finished",
            Phase::Failed => "failed",
            Phase::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// What ended a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionTrigger {
    /// The candidate pressed submit.
    Manual,
    /// The question timer ran out.
    Timeout,
}

/// Final outcome recorded for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Pass,
    Fail,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Pass => f.write_str("pass"),
            OutcomeKind::Fail => f.write_str("fail"),
        }
    }
}

/// An answer that earned a follow-up instead of finalizing the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpTurn {
    pub answer: String,
    pub evaluation_score: f64,
    pub points_earned: f64,
    pub feedback: String,
    /// The clarifying prompt this answer earned.
    pub prompt: String,
    #[serde(default)]
    pub evaluation_failed: bool,
}

/// One finalized question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: Question,
    /// The finalizing answer (empty on a blank timeout).
    pub answer: String,
    pub difficulty: Difficulty,
    pub question_points: u32,
    pub evaluation_score: f64,
    /// `evaluation_score * question_points`, kept exact.
    pub points_earned: f64,
    pub feedback: String,
    pub outcome: OutcomeKind,
    pub trigger: SubmissionTrigger,
    /// Follow-up prompt the finalizing answer responded to.
    #[serde(default)]
    pub follow_up_prompt: Option<String>,
    /// Earlier rounds on the same question, oldest first.
    #[serde(default)]
    pub follow_ups: Vec<FollowUpTurn>,
    #[serde(default)]
    pub evaluation_failed: bool,
    pub answered_at: DateTime<Utc>,
}

/// Read-only view of a session, published after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub candidate: Option<Candidate>,
    pub difficulty: Difficulty,
    pub questions_asked: u32,
    pub max_questions: u32,
    pub score: u32,
    pub current_question: Option<Question>,
    pub follow_up_question: Option<String>,
    pub time_remaining: u32,
    pub history: Vec<HistoryEntry>,
    pub is_submission_in_flight: bool,
    /// Evaluations applied so far, follow-up rounds included.
    #[serde(default)]
    pub evaluations_completed: u64,
    /// Reason the session failed, if it did.
    pub error: Option<String>,
}
