//! Scoring policy: outcome bands, point credit and the final verdict.
//!
//! The running score is an integer: it is only ever credited with whole
//! table values. The fractional `points_earned` of each answer is recorded in
//! history as an `f64` and rounded to one decimal only for display.

use serde::{Deserialize, Serialize};

use crate::model::Difficulty;
use crate::session::{HistoryEntry, OutcomeKind, SubmissionTrigger};
use crate::traits::Evaluation;

/// Number of finalized questions in a complete session.
pub const MAX_QUESTIONS: u32 = 10;

/// Evaluation score at or above which an answer passes.
pub const PASS_BAND: f64 = 0.75;

/// Evaluation score at or above which a follow-up may be offered.
pub const FOLLOW_UP_BAND: f64 = 0.30;

/// Final percentage needed to pass the interview.
pub const PASS_THRESHOLD_PERCENT: f64 = 75.0;

/// Feedback recorded when the evaluator could not grade an answer.
pub const EVALUATION_FAILED_FEEDBACK: &str = "Unable to evaluate — scored as incorrect";

/// Band an evaluation falls into, checked in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Correct enough to credit the question and raise difficulty.
    Pass,
    /// Partially correct; ask the enclosed clarifying prompt.
    FollowUp(String),
    /// Incorrect, or partial without a prompt.
    Fail,
}

impl Outcome {
    /// Classify a normalized evaluation.
    pub fn classify(evaluation: &Evaluation) -> Self {
        if evaluation.score >= PASS_BAND {
            return Outcome::Pass;
        }
        match &evaluation.follow_up {
            Some(prompt) if evaluation.score >= FOLLOW_UP_BAND => Outcome::FollowUp(prompt.clone()),
            _ => Outcome::Fail,
        }
    }
}

/// Fractional points an evaluation is worth at a difficulty.
pub fn earned_points(evaluation_score: f64, difficulty: Difficulty) -> f64 {
    evaluation_score * difficulty.points() as f64
}

/// Points credited to the running score for a finalized answer.
///
/// A pass credits the full table value rather than `earned_points`. This
/// looks like an upstream defect but existing scores depend on it.
pub fn credited_points(outcome: OutcomeKind, difficulty: Difficulty) -> u32 {
    match outcome {
        OutcomeKind::Pass => difficulty.points(),
        OutcomeKind::Fail => 0,
    }
}

/// Final percentage, normalized against ten medium questions (100 points)
/// regardless of the difficulty path actually taken.
pub fn final_percentage(score: u32) -> f64 {
    let baseline = (MAX_QUESTIONS * Difficulty::Medium.points()) as f64;
    score as f64 / baseline * 100.0
}

/// Pass/fail verdict for a running score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterviewResult {
    /// Raw running score.
    pub score: u32,
    /// Score as a percentage of the baseline.
    pub percentage: f64,
    /// Whether the percentage meets the threshold.
    pub passed: bool,
}

impl InterviewResult {
    pub fn from_score(score: u32) -> Self {
        let percentage = final_percentage(score);
        Self {
            score,
            percentage,
            passed: percentage >= PASS_THRESHOLD_PERCENT,
        }
    }
}

/// Performance summary over a session's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Finalized questions.
    pub answered: u32,
    /// Questions finalized as pass.
    pub passed: u32,
    /// Questions finalized as fail.
    pub failed: u32,
    /// Follow-up rounds across all questions.
    pub follow_up_rounds: u32,
    /// Questions finalized by the timer.
    pub timeouts: u32,
    /// Submissions the evaluator could not grade.
    pub evaluation_failures: u32,
    /// Questions asked at each tier.
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
    /// Highest tier reached, if any question was answered.
    pub highest_difficulty: Option<Difficulty>,
    /// Mean evaluation score of the finalizing answers.
    pub mean_evaluation_score: f64,
    /// Sum of fractional points across finalizing answers.
    pub points_earned: f64,
}

/// Compute summary statistics from finalized history.
pub fn compute_session_stats(history: &[HistoryEntry]) -> SessionStats {
    let mut stats = SessionStats::default();

    for entry in history {
        stats.answered += 1;
        match entry.outcome {
            OutcomeKind::Pass => stats.passed += 1,
            OutcomeKind::Fail => stats.failed += 1,
        }
        match entry.difficulty {
            Difficulty::Easy => stats.easy += 1,
            Difficulty::Medium => stats.medium += 1,
            Difficulty::Hard => stats.hard += 1,
        }
        if entry.trigger == SubmissionTrigger::Timeout {
            stats.timeouts += 1;
        }
        stats.evaluation_failures += entry.evaluation_failed as u32;
        stats.evaluation_failures += entry
            .follow_ups
            .iter()
            .filter(|turn| turn.evaluation_failed)
            .count() as u32;
        stats.follow_up_rounds += entry.follow_ups.len() as u32;
        stats.points_earned += entry.points_earned;
        stats.mean_evaluation_score += entry.evaluation_score;
        stats.highest_difficulty = stats.highest_difficulty.max(Some(entry.difficulty));
    }

    if stats.answered > 0 {
        stats.mean_evaluation_score /= stats.answered as f64;
    }

    stats
}

/// Most questions a single session can ever request at `difficulty`.
///
/// Walks every pass/fail sequence of a full session starting from `Easy`.
/// Follow-up rounds do not change the tier, so they do not add demand.
pub fn worst_case_demand(difficulty: Difficulty) -> u32 {
    let transitions = MAX_QUESTIONS.saturating_sub(1);
    let mut worst = 0;

    for path in 0u32..(1 << transitions) {
        let mut current = Difficulty::Easy;
        let mut count = u32::from(current == difficulty);
        for step in 0..transitions {
            current = if path & (1 << step) != 0 {
                current.raise()
            } else {
                current.lower()
            };
            count += u32::from(current == difficulty);
        }
        worst = worst.max(count);
    }

    worst
}
