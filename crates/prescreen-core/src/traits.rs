//! Collaborator traits: answer evaluators and question sources.
//!
//! These async traits are implemented by `prescreen-providers` (evaluators)
//! and by [`crate::bank::QuestionBankSource`] (questions).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, Question};

// ---------------------------------------------------------------------------
// Evaluator trait
// ---------------------------------------------------------------------------

/// Trait for backends that grade a free-text answer.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Human-readable evaluator name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Grade an answer. May take arbitrarily long; the engine bounds the call.
    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<Evaluation>;

    /// List models this evaluator can grade with.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Everything an evaluator needs to grade one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// The question being answered.
    pub question: Question,
    /// The candidate's answer, possibly empty on timeout.
    pub answer: String,
    /// Follow-up prompt the answer responds to, if any.
    #[serde(default)]
    pub follow_up_prompt: Option<String>,
    /// Role the candidate applied for.
    pub role: String,
}

/// Raw grading returned by an evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Correctness in [0, 1].
    pub score: f64,
    /// Feedback shown to the candidate.
    pub feedback: String,
    /// Clarifying prompt for partially correct answers.
    #[serde(default)]
    pub follow_up: Option<String>,
}

impl Evaluation {
    /// Clamp the score into [0, 1] and drop blank follow-ups.
    ///
    /// Returns `None` when the score is not a finite number.
    pub fn normalized(self) -> Option<Self> {
        if !self.score.is_finite() {
            return None;
        }
        let follow_up = self
            .follow_up
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("null"));
        Some(Self {
            score: self.score.clamp(0.0, 1.0),
            feedback: self.feedback,
            follow_up,
        })
    }
}

/// Information about a grading model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
}

// ---------------------------------------------------------------------------
// Question source trait
// ---------------------------------------------------------------------------

/// Trait for providers of interview questions.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Pick the next question. `Ok(None)` means nothing is left at the
    /// requested difficulty.
    async fn next_question(&self, request: &QuestionRequest) -> anyhow::Result<Option<Question>>;
}

/// Request for the next question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest {
    /// Role the candidate applied for.
    pub role: String,
    /// Tier to draw from.
    pub difficulty: Difficulty,
    /// Ids already asked in this session.
    #[serde(default)]
    pub exclude: Vec<String>,
}

// ---------------------------------------------------------------------------
// Default grading prompt
// ---------------------------------------------------------------------------

/// Default system prompt for LLM-backed evaluators.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a strict but fair technical interviewer. Grade the candidate's answer against the reference answer. Respond ONLY with a single JSON object, no prose and no markdown.";

// ---------------------------------------------------------------------------
// JSON extraction
// ---------------------------------------------------------------------------

/// Extract the JSON object from an LLM response.
///
/// Handles:
/// - ```json``` or generic fenced blocks
/// - Bare objects surrounded by prose (first `{` to last `}`)
/// - Returns `None` when no object is present
pub fn extract_json_object(response: &str) -> Option<&str> {
    let mut body = response;

    if let Some(fence) = response.find("```") {
        let after = &response[fence + 3..];
        let after = after
            .strip_prefix("json")
            .or_else(|| after.strip_prefix("JSON"))
            .unwrap_or(after);
        body = match after.find("```") {
            Some(end) => &after[..end],
            // Truncated (unclosed) block
            None => after,
        };
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(body[start..=end].trim())
}
