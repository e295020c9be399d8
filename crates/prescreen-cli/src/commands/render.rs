//! The `prescreen render` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use prescreen_core::report::InterviewReport;
use prescreen_report::html::generate_html;

pub fn execute(report_path: PathBuf, format: String, output: Option<PathBuf>) -> Result<()> {
    let report = InterviewReport::load_json(&report_path)?;

    let rendered = match format.as_str() {
        "html" => generate_html(&report),
        "markdown" | "md" => report.to_markdown(),
        "text" => {
            let mut text = String::new();
            if let Some(c) = &report.candidate {
                text.push_str(&format!("{} <{}>, {} ({})\n", c.name, c.email, c.role, c.experience));
            }
            if !report.history.is_empty() {
                text.push_str(&format!("{}\n", super::summary_table(&report)));
            }
            for line in super::summary_lines(&report) {
                text.push_str(&line);
                text.push('\n');
            }
            text
        }
        other => anyhow::bail!("unknown format '{other}'. Use text, markdown or html"),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
