//! Error types for the session engine and its collaborators.
//!
//! `ProviderError` lives here rather than in `prescreen-providers` so the
//! engine can downcast evaluator failures for logging without string matching.

use thiserror::Error;

use crate::model::Difficulty;
use crate::session::Phase;

/// Errors returned at the engine boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// `start_session` was called outside the welcome phase.
    #[error("session already started (phase: {0})")]
    AlreadyStarted(Phase),

    /// An answer operation was attempted while not interviewing.
    #[error("session is not interviewing (phase: {0})")]
    NotInterviewing(Phase),

    /// Candidate details failed validation.
    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),

    /// A manual submission carried no text.
    #[error("answer is empty")]
    EmptyAnswer,

    /// A submission is already being evaluated.
    #[error("a submission is already being evaluated")]
    SubmissionInFlight,

    /// There is no active question to answer.
    #[error("no active question")]
    NoActiveQuestion,

    /// The question source had nothing left at the requested difficulty.
    #[error("no questions available at difficulty {0}")]
    QuestionsExhausted(Difficulty),

    /// The question source itself failed.
    #[error("question source failed: {0}")]
    QuestionSource(String),
}

/// Errors that can occur when calling an evaluation backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The backend answered but the grading could not be decoded.
    #[error("malformed evaluation: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and retrying is pointless.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }
}
