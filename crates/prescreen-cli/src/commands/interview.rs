//! The `prescreen interview` command.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use prescreen_core::bank::{load_banks, QuestionBankSource};
use prescreen_core::driver::{DriverCommand, SessionDriver};
use prescreen_core::engine::{SessionEngine, SessionObserver};
use prescreen_core::error::SessionError;
use prescreen_core::model::{Candidate, ExperienceBand, Question};
use prescreen_core::report::InterviewReport;
use prescreen_core::scoring::{InterviewResult, MAX_QUESTIONS};
use prescreen_core::session::{HistoryEntry, Phase, SessionSnapshot, SubmissionTrigger};
use prescreen_providers::config::load_config_from;
use prescreen_providers::create_evaluator;
use prescreen_report::html::write_html_report;

/// Typed `:quit` on its own line abandons the session.
///
/// Input is line based: nothing reaches the engine until Enter is pressed,
/// so there is no draft and a question that times out is submitted blank.
const QUIT_COMMAND: &str = ":quit";

pub struct InterviewArgs {
    pub bank: Option<PathBuf>,
    pub name: String,
    pub email: String,
    pub role: String,
    pub experience: String,
    pub evaluator: Option<String>,
    pub model: Option<String>,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: String,
}

/// Console progress observer.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_question(&self, question: &Question, number: u32, time_budget_secs: u32) {
        println!(
            "\nQuestion {number}/{MAX_QUESTIONS} [{}] ({time_budget_secs}s)",
            question.difficulty.label()
        );
        println!("{}", question.text);
    }

    fn on_tick(&self, remaining_secs: u32) {
        if matches!(remaining_secs, 30 | 10 | 5) {
            eprintln!("  {remaining_secs}s left");
        }
    }

    fn on_follow_up(&self, prompt: &str, feedback: &str) {
        println!("  {feedback}");
        println!("\nFollow-up: {prompt}");
    }

    fn on_answer_finalized(&self, entry: &HistoryEntry) {
        let timeout = if entry.trigger == SubmissionTrigger::Timeout {
            " (time's up)"
        } else {
            ""
        };
        println!(
            "  {}{timeout}: {} ({:.0}%)",
            entry.outcome.to_string().to_uppercase(),
            entry.feedback,
            entry.evaluation_score * 100.0
        );
    }

    fn on_finished(&self, result: &InterviewResult) {
        println!("\nInterview complete: score {} ({:.1}%)", result.score, result.percentage);
    }

    fn on_failed(&self, reason: &str) {
        eprintln!("\nInterview stopped: {reason}");
    }

    fn on_rejected(&self, error: &SessionError) {
        eprintln!("  {error}");
    }
}

pub async fn execute(args: InterviewArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;

    let experience: ExperienceBand = args
        .experience
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let candidate = Candidate {
        name: args.name,
        email: args.email,
        role: args.role,
        experience,
    };
    candidate
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid candidate: {e}"))?;

    let bank_path = args.bank.unwrap_or_else(|| config.question_banks.clone());
    let banks = load_banks(&bank_path)
        .with_context(|| format!("failed to load question banks from {}", bank_path.display()))?;
    let source = QuestionBankSource::new(banks);
    anyhow::ensure!(
        source.has_role(&candidate.role),
        "no question bank for role '{}'. Available: {}",
        candidate.role,
        source.roles().join(", ")
    );

    let evaluator_name = args
        .evaluator
        .unwrap_or_else(|| config.default_evaluator.clone());
    let evaluator = create_evaluator(
        &evaluator_name,
        &config,
        args.model.as_deref(),
        config.temperature,
    )?;

    let mut engine = SessionEngine::new(evaluator, Arc::new(source), config.engine_config())
        .with_observer(Arc::new(ConsoleObserver));

    eprintln!(
        "prescreen v{}: {} for {} ({} evaluator)",
        env!("CARGO_PKG_VERSION"),
        candidate.name,
        candidate.role,
        engine.evaluator_name()
    );
    eprintln!("Type your answer on one line and press Enter. Type {QUIT_COMMAND} to stop.");
    eprintln!("Unfinished lines are not kept: a question that times out is submitted blank.");

    if let Err(e) = engine.start_session(candidate).await {
        // A source failure still leaves a reportable (failed) session behind.
        if engine.phase() != Phase::Failed {
            return Err(e.into());
        }
    }

    if !engine.is_terminal() {
        let (tx, mut rx) = mpsc::channel(16);
        spawn_stdin_reader(tx, engine.subscribe());
        SessionDriver::new().run(&mut engine, &mut rx).await;
    }

    let report = engine.report();
    print_summary(&report);

    let output = args.output.unwrap_or_else(|| config.output_dir.clone());
    save_report(&report, &output, &args.format)?;

    if report.phase == Phase::Failed {
        anyhow::bail!(
            "interview failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// Read answers from stdin on a plain thread so a pending read never blocks
/// runtime shutdown. After each answer the next line is held back until that
/// answer has been graded.
fn spawn_stdin_reader(
    tx: mpsc::Sender<DriverCommand>,
    mut snapshots: watch::Receiver<SessionSnapshot>,
) {
    let runtime = tokio::runtime::Handle::current();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim() == QUIT_COMMAND {
                let _ = tx.blocking_send(DriverCommand::Quit);
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let graded = snapshots.borrow_and_update().evaluations_completed;
            if tx.blocking_send(DriverCommand::Submit(line)).is_err() {
                break;
            }
            let settled = runtime
                .block_on(snapshots.wait_for(|s| {
                    s.phase.is_terminal() || s.evaluations_completed > graded
                }))
                .is_ok();
            if !settled {
                break;
            }
        }
        tracing::debug!("stdin closed");
    });
}

fn print_summary(report: &InterviewReport) {
    if !report.history.is_empty() {
        eprintln!("\n{}", super::summary_table(report));
    }
    for line in super::summary_lines(report) {
        eprintln!("{line}");
    }
}

fn save_report(report: &InterviewReport, output: &std::path::Path, format: &str) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let timestamp = report.created_at.format("%Y-%m-%dT%H%M%S");
    let stem = format!("interview-{timestamp}");

    let formats: Vec<&str> = if format == "all" {
        vec!["json", "html", "markdown"]
    } else {
        format.split(',').map(str::trim).collect()
    };

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = output.join(format!("{stem}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("{stem}.html"));
                write_html_report(report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            "markdown" | "md" => {
                let path = output.join(format!("{stem}.md"));
                std::fs::write(&path, report.to_markdown())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                eprintln!("Markdown report: {}", path.display());
            }
            _ => {
                eprintln!("Unknown format: {fmt}");
            }
        }
    }

    Ok(())
}
