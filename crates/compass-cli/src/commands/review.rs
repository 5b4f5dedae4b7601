//! The `compass review` command.

use anyhow::Result;

use compass_core::traits::ResultStore;

use super::{GlobalOpts, Workspace};

pub async fn execute(opts: &GlobalOpts, result_id: u64, expert_id: u64) -> Result<()> {
    let workspace = Workspace::open(opts)?;
    let result = workspace.store.mark_reviewed(result_id, expert_id).await?;
    workspace.save()?;

    tracing::info!(result_id, expert_id, "result reviewed");
    println!("Result {} marked {} by expert {expert_id}", result.id, result.status);
    Ok(())
}
