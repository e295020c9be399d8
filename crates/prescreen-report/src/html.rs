//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::Result;
use std::path::Path;

use prescreen_core::model::Difficulty;
use prescreen_core::report::InterviewReport;
use prescreen_core::scoring::MAX_QUESTIONS;
use prescreen_core::session::{HistoryEntry, OutcomeKind, SubmissionTrigger};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML page from an interview report.
pub fn generate_html(report: &InterviewReport) -> String {
    let mut html = String::new();

    let title = match &report.candidate {
        Some(c) => format!("prescreen report: {}", c.name),
        None => "prescreen report".to_string(),
    };

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{}</title>\n", html_escape(&title)));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>Interview report</h1>\n");
    if let Some(c) = &report.candidate {
        html.push_str(&format!(
            "<p class=\"meta\"><strong>{}</strong> &lt;{}&gt; | {} | {}</p>\n",
            html_escape(&c.name),
            html_escape(&c.email),
            html_escape(&c.role),
            html_escape(&c.experience.to_string()),
        ));
    }
    html.push_str(&format!(
        "<p class=\"meta\">Evaluator: {} | {} | {:.1}s</p>\n",
        html_escape(&report.evaluator),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_ms as f64 / 1000.0
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    let verdict_class = if report.result.passed { "pass" } else { "fail" };
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str(&format!(
        "<p class=\"verdict {}\">{}</p>\n",
        verdict_class,
        html_escape(&report.verdict())
    ));
    if let Some(error) = &report.error {
        html.push_str(&format!(
            "<p class=\"error\">Session error: {}</p>\n",
            html_escape(error)
        ));
    }

    let stats = &report.stats;
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Score</th><th>Questions</th><th>Passed</th><th>Failed</th><th>Follow-ups</th><th>Timeouts</th><th>Mean grade</th></tr></thead>\n");
    html.push_str(&format!(
        "<tbody><tr><td>{}</td><td>{}/{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.0}%</td></tr></tbody>\n",
        report.result.score,
        stats.answered,
        MAX_QUESTIONS,
        stats.passed,
        stats.failed,
        stats.follow_up_rounds,
        stats.timeouts,
        stats.mean_evaluation_score * 100.0,
    ));
    html.push_str("</table>\n");

    if !report.history.is_empty() {
        html.push_str(&generate_bar_chart(&report.history));
    }

    html.push_str("</section>\n");

    // Per-question results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Answers</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">#</th><th onclick=\"sortTable(1)\">Level</th><th onclick=\"sortTable(2)\">Question</th><th onclick=\"sortTable(3)\">Grade</th><th onclick=\"sortTable(4)\">Points</th><th onclick=\"sortTable(5)\">Outcome</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for (i, entry) in report.history.iter().enumerate() {
        let class = match entry.outcome {
            OutcomeKind::Pass => "pass",
            OutcomeKind::Fail => "fail",
        };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{:.0}%</td><td>{:.1}/{}</td><td>{}</td></tr>\n",
            class,
            i + 1,
            entry.difficulty.label(),
            html_escape(&entry.question.text),
            entry.evaluation_score * 100.0,
            entry.points_earned,
            entry.question_points,
            outcome_text(entry),
        ));
    }

    html.push_str("</tbody></table>\n");

    for (i, entry) in report.history.iter().enumerate() {
        html.push_str(&render_transcript(i + 1, entry));
    }
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &InterviewReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn outcome_text(entry: &HistoryEntry) -> String {
    let mut text = match entry.outcome {
        OutcomeKind::Pass => "PASS".to_string(),
        OutcomeKind::Fail => "FAIL".to_string(),
    };
    if !entry.follow_ups.is_empty() {
        text.push_str(&format!(" after {} follow-up", entry.follow_ups.len()));
    }
    if entry.trigger == SubmissionTrigger::Timeout {
        text.push_str(" (timeout)");
    }
    if entry.evaluation_failed {
        text.push_str(" (not graded)");
    }
    text
}

fn render_transcript(number: usize, entry: &HistoryEntry) -> String {
    let mut out = String::from("<details class=\"transcript\">\n");
    out.push_str(&format!(
        "<summary>Q{}. {}</summary>\n<dl>\n",
        number,
        html_escape(&entry.question.text)
    ));
    for turn in &entry.follow_ups {
        out.push_str(&format!(
            "<dt>Answer ({:.0}%)</dt><dd>{}</dd>\n<dt>Feedback</dt><dd>{}</dd>\n<dt>Follow-up</dt><dd>{}</dd>\n",
            turn.evaluation_score * 100.0,
            html_escape(&turn.answer),
            html_escape(&turn.feedback),
            html_escape(&turn.prompt),
        ));
    }
    let answer = if entry.answer.trim().is_empty() {
        "<em>no answer</em>".to_string()
    } else {
        html_escape(&entry.answer)
    };
    out.push_str(&format!(
        "<dt>Answer ({:.0}%)</dt><dd>{}</dd>\n<dt>Feedback</dt><dd>{}</dd>\n",
        entry.evaluation_score * 100.0,
        answer,
        html_escape(&entry.feedback),
    ));
    out.push_str("</dl>\n</details>\n");
    out
}

/// Pass rate per tier, one bar per tier that was asked at least once.
fn generate_bar_chart(history: &[HistoryEntry]) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 200;

    let tiers: Vec<(Difficulty, usize, usize)> = Difficulty::ALL
        .iter()
        .map(|&d| {
            let asked = history.iter().filter(|e| e.difficulty == d).count();
            let passed = history
                .iter()
                .filter(|e| e.difficulty == d && e.outcome == OutcomeKind::Pass)
                .count();
            (d, asked, passed)
        })
        .filter(|(_, asked, _)| *asked > 0)
        .collect();

    let total_height = tiers.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 100,
        total_height
    );

    for (i, (difficulty, asked, passed)) in tiers.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let rate = *passed as f64 / *asked as f64;
        let width = (rate * max_width as f64) as usize;

        let color = if rate >= 0.75 {
            "#22c55e"
        } else if rate >= 0.3 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{} (level {})</text>\n",
            label_width - 10,
            y + bar_height / 2,
            difficulty.label(),
            difficulty
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}/{} passed</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            passed,
            asked
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.verdict { font-size: 1.5rem; font-weight: bold; padding: 0.5rem 1rem; border-radius: 8px; display: inline-block; }
.error { color: #ef4444; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
dt { font-weight: bold; margin-top: 0.5rem; }
dd { margin-left: 1rem; white-space: pre-wrap; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, {numeric: true}) : vb.localeCompare(va, undefined, {numeric: true});
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
