//! The `prescreen list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use prescreen_core::traits::ModelInfo;
use prescreen_providers::config::{load_config_from, ProviderConfig};
use prescreen_providers::create_evaluator;
use prescreen_providers::ollama::{self, OllamaEvaluator};

pub async fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut names: Vec<&str> = config.providers.keys().map(String::as_str).collect();
    if !names.contains(&"keyword") {
        names.push("keyword");
    }
    names.sort_unstable();

    for name in names {
        if provider_filter.as_deref().is_some_and(|filter| filter != name) {
            continue;
        }

        let models = match config.providers.get(name) {
            // Ask the local server what it has pulled.
            Some(ProviderConfig::Ollama { base_url }) => {
                let evaluator = OllamaEvaluator::new(base_url, ollama::DEFAULT_MODEL)?;
                match evaluator.list_models_async().await {
                    Ok(models) => models,
                    Err(e) => {
                        eprintln!("Provider {name}: {e:#}");
                        continue;
                    }
                }
            }
            _ => create_evaluator(name, &config, None, config.temperature)?.available_models(),
        };

        print_models(name, &models);
    }

    Ok(())
}

fn print_models(provider: &str, models: &[ModelInfo]) {
    println!("Provider: {provider}");
    if models.is_empty() {
        println!("  (no models reported)");
    }
    for model in models {
        if model.max_context > 0 {
            println!(
                "  {} — {} ({}K context)",
                model.id,
                model.name,
                model.max_context / 1000
            );
        } else {
            println!("  {} — {}", model.id, model.name);
        }
    }
    println!();
}
