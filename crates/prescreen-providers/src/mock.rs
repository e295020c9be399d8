//! Mock evaluator for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use prescreen_core::traits::{Evaluation, EvaluationRequest, Evaluator, ModelInfo};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Grade(Evaluation),
    Fail(String),
}

impl MockReply {
    pub fn score(score: f64) -> Self {
        MockReply::Grade(Evaluation {
            score,
            feedback: format!("mock score {score}"),
            follow_up: None,
        })
    }

    pub fn follow_up(score: f64, prompt: &str) -> Self {
        MockReply::Grade(Evaluation {
            score,
            feedback: format!("mock score {score}"),
            follow_up: Some(prompt.to_string()),
        })
    }
}

/// A mock evaluator for exercising the session engine without real APIs.
///
/// Replays scripted replies in order, then keeps returning the fallback.
pub struct MockEvaluator {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    delay: Duration,
    call_count: AtomicU32,
    last_request: Mutex<Option<EvaluationRequest>>,
}

impl MockEvaluator {
    /// Create a mock replaying `replies`, then scoring 0.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            fallback: MockReply::score(0.0),
            delay: Duration::ZERO,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same score.
    pub fn with_fixed_score(score: f64) -> Self {
        Self {
            fallback: MockReply::score(score),
            ..Self::new(vec![])
        }
    }

    /// Create a mock whose every call fails.
    pub fn failing(message: &str) -> Self {
        Self {
            fallback: MockReply::Fail(message.to_string()),
            ..Self::new(vec![])
        }
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of calls made to this evaluator.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this evaluator.
    pub fn last_request(&self) -> Option<EvaluationRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<Evaluation> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            MockReply::Grade(evaluation) => Ok(evaluation),
            MockReply::Fail(message) => Err(anyhow::anyhow!(message)),
        }
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
        }]
    }
}
