//! Interview report with JSON persistence and a markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Candidate;
use crate::scoring::{InterviewResult, SessionStats, MAX_QUESTIONS};
use crate::session::{HistoryEntry, Phase, SubmissionTrigger};

/// A complete record of one interview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// Session the report was taken from.
    pub session_id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub candidate: Option<Candidate>,
    /// Name of the evaluator that graded the answers.
    pub evaluator: String,
    /// Phase at the time of the report.
    pub phase: Phase,
    pub result: InterviewResult,
    pub stats: SessionStats,
    pub history: Vec<HistoryEntry>,
    /// Failure reason, for failed sessions.
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock duration of the session in milliseconds.
    pub duration_ms: u64,
}

impl InterviewReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: InterviewReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Short verdict line, e.g. `PASSED (80.0%)`.
    pub fn verdict(&self) -> String {
        match self.phase {
            Phase::Finished if self.result.passed => {
                format!("PASSED ({:.1}%)", self.result.percentage)
            }
            Phase::Finished => format!("NOT PASSED ({:.1}%)", self.result.percentage),
            other => format!("INCOMPLETE ({other})"),
        }
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Interview Report\n\n");
        if let Some(candidate) = &self.candidate {
            md.push_str(&format!(
                "**Candidate:** {} <{}>  \n**Role:** {}  \n**Experience:** {}  \n",
                candidate.name, candidate.email, candidate.role, candidate.experience
            ));
        }
        md.push_str(&format!(
            "**Evaluator:** {}  \n**Date:** {}  \n\n",
            self.evaluator,
            self.created_at.format("%Y-%m-%d %H:%M UTC")
        ));

        md.push_str(&format!("## Result: {}\n\n", self.verdict()));
        md.push_str(&format!(
            "**Score:** {} | **Questions:** {}/{} | **Passed:** {} | **Follow-ups:** {} | **Timeouts:** {}\n\n",
            self.result.score,
            self.stats.answered,
            MAX_QUESTIONS,
            self.stats.passed,
            self.stats.follow_up_rounds,
            self.stats.timeouts
        ));
        if let Some(error) = &self.error {
            md.push_str(&format!("> Session error: {error}\n\n"));
        }

        if self.history.is_empty() {
            return md;
        }

        md.push_str("## Answers\n\n");
        md.push_str("| # | Level | Question | Score | Points | Outcome |\n");
        md.push_str("|---|-------|----------|-------|--------|---------|\n");
        for (i, entry) in self.history.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} | {} | {:.0}% | {:.1}/{} | {} |\n",
                i + 1,
                entry.difficulty,
                escape_cell(&entry.question.text),
                entry.evaluation_score * 100.0,
                entry.points_earned,
                entry.question_points,
                outcome_label(entry)
            ));
        }
        md.push('\n');

        md.push_str("## Feedback\n\n");
        for (i, entry) in self.history.iter().enumerate() {
            md.push_str(&format!("**Q{}.** {}\n\n", i + 1, entry.question.text));
            for turn in &entry.follow_ups {
                md.push_str(&format!("- Answer: {}\n", turn.answer));
                md.push_str(&format!("  - Feedback: {}\n", turn.feedback));
                md.push_str(&format!("  - Follow-up: {}\n", turn.prompt));
            }
            let answer = if entry.answer.trim().is_empty() {
                "(no answer)"
            } else {
                entry.answer.as_str()
            };
            md.push_str(&format!("- Answer: {answer}\n"));
            md.push_str(&format!("  - Feedback: {}\n\n", entry.feedback));
        }

        md
    }
}

fn outcome_label(entry: &HistoryEntry) -> String {
    let mut label = entry.outcome.to_string();
    if !entry.follow_ups.is_empty() {
        label.push_str(" (after follow-up)");
    }
    if entry.trigger == SubmissionTrigger::Timeout {
        label.push_str(" (timeout)");
    }
    label
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
