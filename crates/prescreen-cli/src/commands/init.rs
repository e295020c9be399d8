//! The `prescreen init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create prescreen.toml
    if std::path::Path::new("prescreen.toml").exists() {
        println!("prescreen.toml already exists, skipping.");
    } else {
        std::fs::write("prescreen.toml", SAMPLE_CONFIG)?;
        println!("Created prescreen.toml");
    }

    // Create example question bank
    std::fs::create_dir_all("question-banks")?;
    let example_path = std::path::Path::new("question-banks/example.toml");
    if example_path.exists() {
        println!("question-banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created question-banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit prescreen.toml to pick an evaluator (keyword works offline)");
    println!("  2. Run: prescreen validate --bank question-banks/example.toml");
    println!(
        "  3. Run: prescreen interview --name \"Ada\" --email ada@example.com --role \"Software Developer\""
    );

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# prescreen configuration

default_evaluator = "keyword"
temperature = 0.0
evaluator_timeout_secs = 30
max_follow_ups = 1
question_banks = "./question-banks"
output_dir = "./prescreen-results"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
"#;

const EXAMPLE_BANK: &str = include_str!("../../../../question-banks/software-developer.toml");
