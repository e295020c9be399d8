//! prescreen-providers: Answer evaluator integrations.
//!
//! Implements the `Evaluator` trait for Anthropic, OpenAI and Ollama, plus an
//! offline keyword evaluator and a scripted mock for tests.

pub mod anthropic;
pub mod config;
pub mod keyword;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod rubric;

pub use config::{
    create_evaluator, load_config, load_config_from, parse_config, PrescreenConfig, ProviderConfig,
};
pub use prescreen_core::error::ProviderError;
