//! Anthropic API evaluator.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use prescreen_core::error::ProviderError;
use prescreen_core::traits::{
    Evaluation, EvaluationRequest, Evaluator, ModelInfo, DEFAULT_SYSTEM_PROMPT,
};

use crate::rubric;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Grades answers with an Anthropic model.
pub struct AnthropicEvaluator {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
}

impl AnthropicEvaluator {
    pub fn new(api_key: &str, model: &str, base_url: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.to_string(),
            temperature: 0.0,
            client,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

#[async_trait]
impl Evaluator for AnthropicEvaluator {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %self.model, question = %request.question.id))]
    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<Evaluation> {
        if let Some(evaluation) = rubric::grade_blank(request) {
            return Ok(evaluation);
        }

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: rubric::GRADING_MAX_TOKENS,
            temperature: self.temperature,
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: rubric::build_prompt(request),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            }
            .into());
        }
        if status == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed(body).into());
        }
        if status == 404 {
            return Err(ProviderError::ModelNotFound(self.model.clone()).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ProviderError::ApiError { status, message }.into());
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("failed to parse response: {e}")))?;

        let content: String = api_response
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        tracing::debug!(reply_len = content.len(), "grading reply received");

        Ok(rubric::parse_evaluation(&content)?)
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-sonnet-4-20250514".into(),
                name: "Claude Sonnet 4".into(),
                provider: "anthropic".into(),
                max_context: 200_000,
            },
            ModelInfo {
                id: "claude-haiku-4-5-20251001".into(),
                name: "Claude Haiku 4.5".into(),
                provider: "anthropic".into(),
                max_context: 200_000,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::sample_request;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn evaluator(server: &MockServer) -> AnthropicEvaluator {
        AnthropicEvaluator::new("test-key", DEFAULT_MODEL, Some(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn successful_grading() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "content": [{"type": "text", "text": "{\"score\": 0.6, \"feedback\": \"Mentions objects but not inheritance.\", \"follow_up\": \"What is inheritance?\"}"}],
            "model": DEFAULT_MODEL,
        });

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(body_string_contains("What is object-oriented programming?"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .expect(1)
            .mount(&server)
            .await;

        let evaluation = evaluator(&server)
            .evaluate(&sample_request("Code organised around objects"))
            .await
            .unwrap();
        assert_eq!(evaluation.score, 0.6);
        assert!(evaluation.feedback.contains("inheritance"));
        assert_eq!(evaluation.follow_up.as_deref(), Some("What is inheritance?"));
    }

    #[tokio::test]
    async fn blank_answer_skips_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let evaluation = evaluator(&server)
            .evaluate(&sample_request(""))
            .await
            .unwrap();
        assert_eq!(evaluation.score, 0.0);
        assert_eq!(evaluation.feedback, rubric::BLANK_ANSWER_FEEDBACK);
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = evaluator(&server)
            .evaluate(&sample_request("objects"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authentication"));
        assert!(err.downcast_ref::<ProviderError>().unwrap().is_permanent());
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
            .mount(&server)
            .await;

        let err = evaluator(&server)
            .evaluate(&sample_request("objects"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::RateLimited { retry_after_ms: 5000 })
        ));
    }

    #[tokio::test]
    async fn api_error_message_is_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "max_tokens too large"}
            })))
            .mount(&server)
            .await;

        let err = evaluator(&server)
            .evaluate(&sample_request("objects"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("max_tokens too large"));
    }

    #[tokio::test]
    async fn prose_reply_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "This answer looks decent to me."}]
            })))
            .mount(&server)
            .await;

        let err = evaluator(&server)
            .evaluate(&sample_request("objects"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::MalformedResponse(_))
        ));
    }
}
