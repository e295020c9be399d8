//! The `prescreen validate` command.

use std::path::PathBuf;

use anyhow::Result;

use prescreen_core::bank::{load_banks, validate_bank};
use prescreen_core::model::Difficulty;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = load_banks(&bank_path)?;
    anyhow::ensure!(
        !banks.is_empty(),
        "no question banks found in {}",
        bank_path.display()
    );

    let mut total_warnings = 0;

    for bank in &banks {
        let per_tier: Vec<String> = Difficulty::ALL
            .iter()
            .map(|&d| format!("{} {}", bank.at(d).count(), d.label()))
            .collect();
        println!(
            "Bank: {} ({} questions: {})",
            bank.role,
            bank.questions.len(),
            per_tier.join(", ")
        );

        let warnings = validate_bank(bank);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All question banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
