//! Test doubles shared by the core unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::model::{Candidate, ExperienceBand, Question};
use crate::traits::{
    Evaluation, EvaluationRequest, Evaluator, ModelInfo, QuestionRequest, QuestionSource,
};

pub fn candidate() -> Candidate {
    Candidate {
        name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        role: "Software Developer".into(),
        experience: ExperienceBand::Mid,
    }
}

/// One scripted evaluator response.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(Evaluation),
    Error,
    Panic,
    /// Never returns within any reasonable timeout.
    Hang,
}

impl Step {
    pub fn score(score: f64) -> Self {
        Step::Reply(Evaluation {
            score,
            feedback: "scripted".into(),
            follow_up: None,
        })
    }

    pub fn follow_up(score: f64, prompt: &str) -> Self {
        Step::Reply(Evaluation {
            score,
            feedback: "scripted".into(),
            follow_up: Some(prompt.into()),
        })
    }
}

/// Evaluator replaying a fixed script. Runs dry with score 0.
pub struct ScriptedEvaluator {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<EvaluationRequest>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedEvaluator {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<EvaluationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let step = self.script.lock().unwrap().pop_front();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Some(Step::Reply(evaluation)) => Ok(evaluation),
            Some(Step::Error) => anyhow::bail!("scripted failure"),
            Some(Step::Panic) => panic!("scripted panic"),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                anyhow::bail!("woke up")
            }
            None => Ok(Evaluation {
                score: 0.0,
                feedback: "script exhausted".into(),
                follow_up: None,
            }),
        }
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![]
    }
}

/// Question source inventing a fresh question for every request.
pub struct GeneratedSource {
    limit: Option<usize>,
    requests: Mutex<Vec<QuestionRequest>>,
}

impl GeneratedSource {
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers `None` after `limit` questions.
    pub fn limited(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<QuestionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionSource for GeneratedSource {
    async fn next_question(&self, request: &QuestionRequest) -> anyhow::Result<Option<Question>> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let n = requests.len();
        if self.limit.is_some_and(|limit| n > limit) {
            return Ok(None);
        }
        Ok(Some(Question {
            id: format!("q{n}"),
            text: format!("Question {n} at level {}", request.difficulty),
            difficulty: request.difficulty,
            reference_answer: Some("reference".into()),
            tags: vec![],
        }))
    }
}
