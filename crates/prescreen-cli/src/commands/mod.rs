pub mod init;
pub mod interview;
pub mod list_models;
pub mod render;
pub mod validate;

use comfy_table::{Cell, Table};

use prescreen_core::report::InterviewReport;
use prescreen_core::scoring::MAX_QUESTIONS;

/// Per-question summary table shared by `interview` and `render`.
pub fn summary_table(report: &InterviewReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "#", "Level", "Question", "Grade", "Points", "Outcome", "Follow-ups",
    ]);

    for (i, entry) in report.history.iter().enumerate() {
        let mut outcome = entry.outcome.to_string().to_uppercase();
        if entry.trigger == prescreen_core::session::SubmissionTrigger::Timeout {
            outcome.push_str(" (timeout)");
        }
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(entry.difficulty.label()),
            Cell::new(truncate(&entry.question.text, 60)),
            Cell::new(format!("{:.0}%", entry.evaluation_score * 100.0)),
            Cell::new(format!("{:.1}/{}", entry.points_earned, entry.question_points)),
            Cell::new(outcome),
            Cell::new(entry.follow_ups.len()),
        ]);
    }

    table
}

/// Headline lines printed under the table.
pub fn summary_lines(report: &InterviewReport) -> Vec<String> {
    let mut lines = vec![
        format!("Result: {}", report.verdict()),
        format!(
            "Score {} | {}/{} questions | {} passed | {} follow-up round(s) | {} timeout(s)",
            report.result.score,
            report.stats.answered,
            MAX_QUESTIONS,
            report.stats.passed,
            report.stats.follow_up_rounds,
            report.stats.timeouts
        ),
    ];
    if let Some(error) = &report.error {
        lines.push(format!("Session error: {error}"));
    }
    lines
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
