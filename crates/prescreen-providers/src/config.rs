//! Evaluator configuration and factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use prescreen_core::engine::EngineConfig;
use prescreen_core::traits::Evaluator;

use crate::anthropic::{self, AnthropicEvaluator};
use crate::keyword::KeywordEvaluator;
use crate::ollama::{self, OllamaEvaluator};
use crate::openai::{self, OpenAiEvaluator};

/// Configuration for a single evaluation backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    /// Offline keyword-coverage grading. Needs no credentials.
    Keyword,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { base_url } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Keyword => f.write_str("Keyword"),
        }
    }
}

fn default_ollama_url() -> String {
    ollama::DEFAULT_BASE_URL.to_string()
}

/// Top-level prescreen configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescreenConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Evaluator used when none is given on the command line.
    #[serde(default = "default_evaluator")]
    pub default_evaluator: String,
    /// Model override. Each backend has its own default.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Grading temperature (0.0 for repeatable grading).
    #[serde(default)]
    pub temperature: f64,
    /// Upper bound on a single evaluator call, in seconds.
    #[serde(default = "default_evaluator_timeout")]
    pub evaluator_timeout_secs: u64,
    /// Follow-up rounds allowed per question. `u32::MAX` (4294967295) leaves them uncapped.
    #[serde(default = "default_max_follow_ups")]
    pub max_follow_ups: u32,
    /// Question bank file or directory.
    #[serde(default = "default_question_banks")]
    pub question_banks: PathBuf,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_evaluator() -> String {
    "keyword".to_string()
}
fn default_evaluator_timeout() -> u64 {
    30
}
fn default_max_follow_ups() -> u32 {
    1
}
fn default_question_banks() -> PathBuf {
    PathBuf::from("./question-banks")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./prescreen-results")
}

impl Default for PrescreenConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_evaluator: default_evaluator(),
            default_model: None,
            temperature: 0.0,
            evaluator_timeout_secs: default_evaluator_timeout(),
            max_follow_ups: default_max_follow_ups(),
            question_banks: default_question_banks(),
            output_dir: default_output_dir(),
        }
    }
}

impl PrescreenConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            evaluator_timeout: Duration::from_secs(self.evaluator_timeout_secs.max(1)),
            max_follow_ups: self.max_follow_ups,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            org_id: org_id.as_ref().map(|o| resolve_env_vars(o)),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
        ProviderConfig::Ollama { base_url } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(base_url),
        },
        ProviderConfig::Keyword => ProviderConfig::Keyword,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `prescreen.toml` in the current directory
/// 2. `~/.config/prescreen/config.toml`
///
/// Environment variable overrides: `PRESCREEN_OPENAI_KEY`, `PRESCREEN_ANTHROPIC_KEY`.
pub fn load_config() -> Result<PrescreenConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<PrescreenConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("prescreen.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => PrescreenConfig::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse configuration TOML and resolve `${VAR}` references.
pub fn parse_config(content: &str) -> Result<PrescreenConfig> {
    let mut config: PrescreenConfig = toml::from_str(content)?;
    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();
    Ok(config)
}

fn apply_env_overrides(config: &mut PrescreenConfig) {
    if let Ok(key) = std::env::var("PRESCREEN_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("PRESCREEN_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("prescreen"))
}

/// Build the evaluator named `name`.
///
/// `keyword` works without configuration and `ollama` falls back to the
/// local default endpoint. Hosted backends need a configured API key.
pub fn create_evaluator(
    name: &str,
    config: &PrescreenConfig,
    model: Option<&str>,
    temperature: f64,
) -> Result<Arc<dyn Evaluator>> {
    let model = model.or(config.default_model.as_deref());

    let provider = match config.providers.get(name) {
        Some(provider) => provider.clone(),
        None => match name {
            "keyword" => ProviderConfig::Keyword,
            "ollama" => ProviderConfig::Ollama {
                base_url: default_ollama_url(),
            },
            "anthropic" => anyhow::bail!(
                "no API key for anthropic. Set PRESCREEN_ANTHROPIC_KEY or add [providers.anthropic] to prescreen.toml"
            ),
            "openai" => anyhow::bail!(
                "no API key for openai. Set PRESCREEN_OPENAI_KEY or add [providers.openai] to prescreen.toml"
            ),
            other => anyhow::bail!(
                "unknown evaluator '{other}'. Available: keyword, anthropic, openai, ollama"
            ),
        },
    };

    tracing::debug!(evaluator = name, ?provider, model, "creating evaluator");

    let evaluator: Arc<dyn Evaluator> = match provider {
        ProviderConfig::Anthropic { api_key, base_url } => {
            if api_key.is_empty() {
                anyhow::bail!("anthropic API key is empty. Set PRESCREEN_ANTHROPIC_KEY");
            }
            let model = model.unwrap_or(anthropic::DEFAULT_MODEL);
            Arc::new(AnthropicEvaluator::new(&api_key, model, base_url)?.with_temperature(temperature))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("openai API key is empty. Set PRESCREEN_OPENAI_KEY");
            }
            let model = model.unwrap_or(openai::DEFAULT_MODEL);
            Arc::new(
                OpenAiEvaluator::new(&api_key, model, base_url, org_id)?
                    .with_temperature(temperature),
            )
        }
        ProviderConfig::Ollama { base_url } => {
            let model = model.unwrap_or(ollama::DEFAULT_MODEL);
            Arc::new(OllamaEvaluator::new(&base_url, model)?.with_temperature(temperature))
        }
        ProviderConfig::Keyword => Arc::new(KeywordEvaluator::new()),
    };

    Ok(evaluator)
}
