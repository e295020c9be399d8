//! Grading prompt construction and reply decoding shared by the LLM
//! evaluators.
//!
//! Backends are asked for a single JSON object:
//!
//! ```json
//! {"score": 0.7, "feedback": "...", "follow_up": "... or null"}
//! ```

use serde::Deserialize;

use prescreen_core::error::ProviderError;
use prescreen_core::traits::{extract_json_object, Evaluation, EvaluationRequest};

/// Feedback for a blank answer, which is never sent to a backend.
pub const BLANK_ANSWER_FEEDBACK: &str = "Please provide an answer.";

/// Max tokens requested for a grading reply.
pub const GRADING_MAX_TOKENS: u32 = 512;

/// Short-circuit grading for blank answers.
pub fn grade_blank(request: &EvaluationRequest) -> Option<Evaluation> {
    request.answer.trim().is_empty().then(|| Evaluation {
        score: 0.0,
        feedback: BLANK_ANSWER_FEEDBACK.to_string(),
        follow_up: None,
    })
}

/// Build the user prompt for grading one answer.
pub fn build_prompt(request: &EvaluationRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("Role: {}\n", request.role));
    prompt.push_str(&format!(
        "Question ({}): {}\n",
        request.question.difficulty.label(),
        request.question.text
    ));
    match &request.question.reference_answer {
        Some(reference) => prompt.push_str(&format!("Correct Answer: {reference}\n")),
        None => prompt.push_str("Correct Answer: (not provided; use your own judgement)\n"),
    }
    if let Some(follow_up) = &request.follow_up_prompt {
        prompt.push_str(&format!(
            "The candidate was asked this follow-up: {follow_up}\n"
        ));
    }
    prompt.push_str(&format!("User Answer: {}\n\n", request.answer));

    prompt.push_str(
        "Evaluate the user's answer and provide:\n\
         1. A score between 0 and 1 based on accuracy\n\
         2. Detailed, constructive feedback explaining what was correct and what could be improved\n\
         3. A relevant follow-up question if the answer shows partial understanding (score between 0.3 and 0.7)\n\n\
         Respond in this exact JSON format:\n\
         {\"score\": <float between 0 and 1>, \"feedback\": \"<detailed feedback>\", \"follow_up\": \"<follow-up question or null>\"}\n",
    );

    prompt
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    score: RawScore,
    #[serde(default)]
    feedback: String,
    #[serde(default, alias = "followUp")]
    follow_up: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

/// Decode a backend reply into an evaluation.
///
/// The score is returned as given; range clamping happens in the engine.
pub fn parse_evaluation(response: &str) -> Result<Evaluation, ProviderError> {
    let json = extract_json_object(response)
        .ok_or_else(|| ProviderError::MalformedResponse("no JSON object in reply".into()))?;

    let raw: RawEvaluation = serde_json::from_str(json)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid grading JSON: {e}")))?;

    let score = match raw.score {
        RawScore::Number(n) => n,
        RawScore::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            ProviderError::MalformedResponse(format!("score is not a number: {s}"))
        })?,
    };

    let follow_up = raw
        .follow_up
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("null"));

    Ok(Evaluation {
        score,
        feedback: raw.feedback,
        follow_up,
    })
}

#[cfg(test)]
pub(crate) fn sample_request(answer: &str) -> EvaluationRequest {
    use prescreen_core::model::{Difficulty, Question};

    EvaluationRequest {
        question: Question {
            id: "sd-oop".into(),
            text: "What is object-oriented programming?".into(),
            difficulty: Difficulty::Easy,
            reference_answer: Some(
                "A programming paradigm based on objects that contain data and code, \
                 built on encapsulation, inheritance and polymorphism."
                    .into(),
            ),
            tags: vec![],
        },
        answer: answer.into(),
        follow_up_prompt: None,
        role: "Software Developer".into(),
    }
}
