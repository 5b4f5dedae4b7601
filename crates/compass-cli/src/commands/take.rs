//! The `compass take` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use compass_core::session::take_test;

use super::{check_format, GlobalOpts, Workspace};

/// Print the question sheet of a test.
pub async fn execute(opts: &GlobalOpts, test_id: u64, format: String) -> Result<()> {
    check_format(&format, &["text", "json"])?;
    let workspace = Workspace::open(opts)?;

    let session = take_test(&*workspace.store, &*workspace.store, test_id).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!("{}", session.title);
    if let Some(description) = &session.description {
        println!("{description}");
    }

    if session.questions.is_empty() {
        println!("\nNo questions assembled for this test.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "ID", "Question", "Construct", "Cluster"]);
    for q in &session.questions {
        table.add_row(vec![
            Cell::new(q.order_no),
            Cell::new(q.question_id),
            Cell::new(&q.text),
            Cell::new(&q.construct),
            Cell::new(&q.cluster),
        ]);
    }
    println!("\n{table}");

    let scale: Vec<String> = session
        .options
        .iter()
        .map(|o| format!("{} = {}", o.value, o.label))
        .collect();
    println!("\nAnswer scale: {}", scale.join(", "));

    Ok(())
}
