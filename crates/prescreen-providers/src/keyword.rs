//! Offline evaluator that grades by reference-answer keyword coverage.
//!
//! Useful for demos, CI and air-gapped runs. It is not a substitute for a
//! language model: it only checks which key terms of the reference answer
//! show up in the candidate's answer.

use async_trait::async_trait;

use prescreen_core::scoring::{FOLLOW_UP_BAND, PASS_BAND};
use prescreen_core::traits::{Evaluation, EvaluationRequest, Evaluator, ModelInfo};

use crate::rubric;

/// Words too common to count as key terms.
const STOP_WORDS: &[&str] = &[
    "about", "also", "allow", "allows", "been", "being", "between", "both", "does", "each",
    "from", "have", "into", "like", "more", "most", "only", "other", "same", "such", "than",
    "that", "their", "them", "then", "there", "these", "they", "this", "through", "used",
    "uses", "using", "very", "what", "when", "where", "which", "while", "with", "without",
    "would", "your",
];

/// Minimum length of a key term.
const MIN_TERM_LEN: usize = 4;

/// Terms are compared on this many leading characters, so "encapsulate"
/// matches "encapsulation".
const STEM_LEN: usize = 6;

/// Answers without a reference are graded by length against this many words.
const UNGRADED_TARGET_WORDS: usize = 20;

/// Missing terms named in a follow-up prompt.
const MAX_HINT_TERMS: usize = 3;

/// Grades answers by keyword overlap with the reference answer.
#[derive(Debug, Default, Clone)]
pub struct KeywordEvaluator;

impl KeywordEvaluator {
    pub fn new() -> Self {
        Self
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn stem(word: &str) -> &str {
    match word.char_indices().nth(STEM_LEN) {
        Some((idx, _)) => &word[..idx],
        None => word,
    }
}

/// Distinct key terms of a reference answer, in order of appearance.
pub fn key_terms(reference: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in words(reference) {
        if word.chars().count() < MIN_TERM_LEN || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        if !terms.iter().any(|t| stem(t) == stem(&word)) {
            terms.push(word);
        }
    }
    terms
}

/// Grade an answer against a reference answer.
pub fn grade(reference: Option<&str>, answer: &str) -> Evaluation {
    let terms = reference.map(key_terms).unwrap_or_default();

    if terms.is_empty() {
        let count = words(answer).count();
        let score = (count as f64 / UNGRADED_TARGET_WORDS as f64).min(1.0);
        return Evaluation {
            score,
            feedback: format!(
                "No reference answer to compare against; graded on completeness ({count} words)."
            ),
            follow_up: None,
        };
    }

    let answer_stems: Vec<String> = words(answer).map(|w| stem(&w).to_string()).collect();
    let (covered, missing): (Vec<&String>, Vec<&String>) = terms
        .iter()
        .partition(|term| answer_stems.iter().any(|s| s == stem(term)));

    let score = covered.len() as f64 / terms.len() as f64;

    let mut feedback = format!("Covered {} of {} key points", covered.len(), terms.len());
    if !covered.is_empty() {
        let names: Vec<&str> = covered.iter().map(|s| s.as_str()).collect();
        feedback.push_str(&format!(" ({})", names.join(", ")));
    }
    feedback.push('.');
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        feedback.push_str(&format!(" Missing: {}.", names.join(", ")));
    }

    let follow_up = (FOLLOW_UP_BAND..PASS_BAND).contains(&score).then(|| {
        let hints: Vec<&str> = missing
            .iter()
            .take(MAX_HINT_TERMS)
            .map(|s| s.as_str())
            .collect();
        format!(
            "Can you expand on how {} fit into your answer?",
            hints.join(", ")
        )
    });

    Evaluation {
        score,
        feedback,
        follow_up,
    }
}

#[async_trait]
impl Evaluator for KeywordEvaluator {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<Evaluation> {
        if let Some(evaluation) = rubric::grade_blank(request) {
            return Ok(evaluation);
        }

        let evaluation = grade(request.question.reference_answer.as_deref(), &request.answer);
        tracing::debug!(
            question = %request.question.id,
            score = evaluation.score,
            "keyword grading"
        );
        Ok(evaluation)
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "keyword".into(),
            name: "Keyword coverage (offline)".into(),
            provider: "keyword".into(),
            max_context: 0,
        }]
    }
}
