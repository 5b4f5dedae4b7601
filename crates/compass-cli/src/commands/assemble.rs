//! The `compass assemble` command.

use anyhow::Result;

use super::{GlobalOpts, Workspace};

/// Regenerate the question list of one test, or of every test.
pub async fn execute(opts: &GlobalOpts, test_id: Option<u64>) -> Result<()> {
    let workspace = Workspace::open(opts)?;
    let assembler = workspace.assembler();

    let test_ids = match test_id {
        Some(id) => vec![id],
        None => workspace
            .store
            .snapshot()?
            .tests
            .iter()
            .map(|t| t.id)
            .collect(),
    };

    let mut reports = Vec::with_capacity(test_ids.len());
    for id in test_ids {
        reports.push(assembler.assemble(id).await?);
    }
    workspace.save()?;

    for report in &reports {
        println!(
            "Test {}: {} of {} requested questions selected (version {})",
            report.test_id, report.selected_count, report.total_requested, report.version
        );
    }
    super::import::print_assembly_table(&reports);

    Ok(())
}
