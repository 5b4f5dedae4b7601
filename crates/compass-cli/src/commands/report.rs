//! The `compass report` command.

use std::path::PathBuf;

use anyhow::Result;

use compass_report::document::{DocumentRenderer, JsonRenderer};
use compass_report::html::HtmlRenderer;

use super::{GlobalOpts, Workspace};

fn renderer_for(format: &str) -> Result<Box<dyn DocumentRenderer>> {
    match format {
        "json" => Ok(Box::new(JsonRenderer)),
        "html" => Ok(Box::new(HtmlRenderer)),
        other => anyhow::bail!("unknown format: {other} (expected one of: json, html)"),
    }
}

pub async fn execute(
    opts: &GlobalOpts,
    result_id: u64,
    summary: Option<String>,
    recommendations: Option<String>,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let renderer = renderer_for(&format)?;
    let workspace = Workspace::open(opts)?;
    let service = workspace.reports();

    if summary.is_some() || recommendations.is_some() {
        service
            .update_text(result_id, summary, recommendations)
            .await?;
    }

    let out_dir = output.unwrap_or_else(|| workspace.config.output_dir.clone());
    let (report, path) = service
        .render(result_id, renderer.as_ref(), &out_dir)
        .await?;
    workspace.save()?;

    println!("Report {} for result {result_id} written to {}", report.id, path.display());
    Ok(())
}
