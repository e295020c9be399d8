//! prescreen CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "prescreen",
    version,
    about = "Adaptive, timed technical pre-screening interviews"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive interview on the terminal
    Interview {
        /// Question bank file or directory (default: from config)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Candidate name
        #[arg(long)]
        name: String,

        /// Candidate email
        #[arg(long)]
        email: String,

        /// Role applied for (selects the question bank)
        #[arg(long)]
        role: String,

        /// Years of experience: 0-2, 2-5, 5-8 or 8+
        #[arg(long, default_value = "0-2")]
        experience: String,

        /// Evaluator: keyword, anthropic, openai, ollama (default: from config)
        #[arg(long)]
        evaluator: Option<String>,

        /// Grading model override
        #[arg(long)]
        model: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory (default: from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, html, markdown, all
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Validate question bank TOML files
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Render a saved interview report
    Render {
        /// Report JSON
        #[arg(long)]
        report: PathBuf,

        /// Output format: text, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List available grading models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("prescreen=warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Interview {
            bank,
            name,
            email,
            role,
            experience,
            evaluator,
            model,
            config,
            output,
            format,
        } => {
            commands::interview::execute(commands::interview::InterviewArgs {
                bank,
                name,
                email,
                role,
                experience,
                evaluator,
                model,
                config,
                output,
                format,
            })
            .await
        }
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Render {
            report,
            format,
            output,
        } => commands::render::execute(report, format, output),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
