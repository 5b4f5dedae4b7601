//! The `compass validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = super::load_banks(&bank_path)?;

    let mut total_warnings = 0;

    for bank in &banks {
        println!(
            "Item bank: {} ({} clusters, {} questions, {} tests)",
            bank.name,
            bank.clusters.len(),
            bank.questions.len(),
            bank.tests.len()
        );

        let warnings = compass_core::parser::validate_bank(bank);
        for w in &warnings {
            let prefix = w
                .subject
                .as_ref()
                .map(|s| format!("  [{s}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All item banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
