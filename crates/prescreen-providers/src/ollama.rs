//! Ollama (local LLM) evaluator.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use prescreen_core::error::ProviderError;
use prescreen_core::traits::{
    Evaluation, EvaluationRequest, Evaluator, ModelInfo, DEFAULT_SYSTEM_PROMPT,
};

use crate::rubric;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 120; // Local models are slower
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Grades answers with a locally served Ollama model.
pub struct OllamaEvaluator {
    base_url: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
}

impl OllamaEvaluator {
    pub fn new(base_url: &str, model: &str) -> anyhow::Result<Self> {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.0,
            client,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Fetch the models installed on the Ollama instance.
    pub async fn list_models_async(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|_| {
                ProviderError::NetworkError(format!(
                    "Ollama not reachable at {}. Is it running? Start with: ollama serve",
                    self.base_url
                ))
            })?;

        let tags: OllamaTagsResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("failed to parse tags response: {e}"))
        })?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                provider: "ollama".into(),
                max_context: 0,
            })
            .collect())
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModelEntry>,
}

#[derive(Deserialize)]
struct OllamaModelEntry {
    name: String,
}

#[async_trait]
impl Evaluator for OllamaEvaluator {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %self.model, question = %request.question.id))]
    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<Evaluation> {
        if let Some(evaluation) = rubric::grade_blank(request) {
            return Ok(evaluation);
        }

        let body = OllamaRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: DEFAULT_SYSTEM_PROMPT.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: rubric::build_prompt(request),
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else if e.is_connect() {
                    ProviderError::NetworkError(format!(
                        "Ollama not reachable at {}. Is it running? Start with: ollama serve",
                        self.base_url
                    ))
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(ProviderError::ModelNotFound(format!(
                "Model '{}' not found locally. Pull it with: ollama pull {}",
                self.model, self.model
            ))
            .into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status,
                message: body,
            }
            .into());
        }

        let api_response: OllamaResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("failed to parse response: {e}"))
        })?;

        Ok(rubric::parse_evaluation(&api_response.message.content)?)
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        // Installed models are only known at runtime; see `list_models_async`.
        vec![]
    }
}
