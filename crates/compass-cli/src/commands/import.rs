//! The `compass import` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use compass_core::assembler::AssemblyReport;
use compass_core::parser::{validate_bank, ItemBank};
use compass_core::store::InMemoryStore;

use super::{GlobalOpts, Workspace};

/// Build a fresh state file from item banks and assemble every test.
pub async fn execute(opts: &GlobalOpts, bank_path: PathBuf, force: bool) -> Result<()> {
    let config = opts.load_config()?;
    if config.state_path.exists() && !force {
        anyhow::bail!(
            "state file already exists: {} (use --force to replace it)",
            config.state_path.display()
        );
    }

    let mut banks = super::load_banks(&bank_path)?.into_iter();
    let mut bank = banks
        .next()
        .with_context(|| format!("no item banks found in {}", bank_path.display()))?;
    for other in banks {
        bank.extend(other);
    }

    for w in validate_bank(&bank) {
        match &w.subject {
            Some(subject) => eprintln!("  [{subject}] WARNING: {}", w.message),
            None => eprintln!("  WARNING: {}", w.message),
        }
    }

    let test_ids: Vec<u64> = bank.tests.iter().map(|t| t.id).collect();
    let summary = describe(&bank);
    let store = InMemoryStore::from_snapshot(bank.into_snapshot())
        .context("item bank is inconsistent")?;
    let workspace = Workspace::from_store(config, store);

    let assembler = workspace.assembler();
    let mut reports = Vec::with_capacity(test_ids.len());
    for test_id in test_ids {
        reports.push(assembler.assemble(test_id).await?);
    }

    workspace.save()?;
    println!("Imported {summary}");
    println!("State written to {}", workspace.config.state_path.display());
    print_assembly_table(&reports);

    Ok(())
}

fn describe(bank: &ItemBank) -> String {
    format!(
        "{}: {} clusters, {} constructs, {} questions, {} tests",
        bank.name,
        bank.clusters.len(),
        bank.constructs.len(),
        bank.questions.len(),
        bank.tests.len()
    )
}

/// Print one row per assembled test, then its shortfall warnings.
pub fn print_assembly_table(reports: &[AssemblyReport]) {
    if reports.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Test", "Selected", "Requested", "Warnings"]);
    for report in reports {
        table.add_row(vec![
            Cell::new(report.test_id),
            Cell::new(report.selected_count),
            Cell::new(report.total_requested),
            Cell::new(report.warnings.len()),
        ]);
    }
    println!("\n{table}");

    for report in reports {
        for warning in &report.warnings {
            println!("  [test {}] WARNING: {warning}", report.test_id);
        }
    }
}
