//! The `compass results` command.

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use compass_core::model::{ScoreMap, TestResult};
use compass_core::scoring::band_average;
use compass_core::session::answers_for_result;
use compass_core::traits::ResultStore;

use super::{check_format, GlobalOpts, Workspace};

/// Which results to list.
#[derive(Debug, Clone, Copy)]
pub enum ResultFilter {
    One(u64),
    User(u64),
    Test(u64),
}

pub async fn execute(opts: &GlobalOpts, filter: ResultFilter, format: String) -> Result<()> {
    check_format(&format, &["text", "json"])?;
    let workspace = Workspace::open(opts)?;
    let store = &workspace.store;

    let results = match filter {
        ResultFilter::One(id) => vec![store
            .result(id)
            .await?
            .with_context(|| format!("result {id} not found"))?],
        ResultFilter::User(user_id) => store.results_for_user(user_id).await?,
        ResultFilter::Test(test_id) => store.results_for_test(test_id).await?,
    };

    if let ResultFilter::One(id) = filter {
        let answers = answers_for_result(&**store, &**store, &**store, id).await?;
        if format == "json" {
            let body = serde_json::json!({ "result": &results[0], "answers": answers });
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }

        print_result(&results[0]);
        let mut table = Table::new();
        table.set_header(vec!["#", "Question", "Construct", "Cluster", "Answer", "Score"]);
        for a in &answers {
            table.add_row(vec![
                Cell::new(a.order_no.map(|n| n.to_string()).unwrap_or_else(|| "-".into())),
                Cell::new(&a.text),
                Cell::new(&a.construct),
                Cell::new(&a.cluster),
                Cell::new(format!(
                    "{} {}",
                    a.answer_value,
                    a.label.unwrap_or_default()
                )),
                Cell::new(format!("{:.2}", a.final_score)),
            ]);
        }
        println!("\n{table}");
        return Ok(());
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Test", "User", "Status", "Average", "Band", "SDB", "Created",
    ]);
    for r in &results {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.test_id),
            Cell::new(r.user_id),
            Cell::new(r.status),
            Cell::new(format!("{:.2}", r.average_score)),
            Cell::new(r.overall_band()),
            Cell::new(if r.sdb_flag { "yes" } else { "no" }),
            Cell::new(r.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");

    Ok(())
}

/// Header lines and score tables of one result.
pub fn print_result(result: &TestResult) {
    println!(
        "Result {} (test {}, user {}): {}",
        result.id, result.test_id, result.user_id, result.status
    );
    println!(
        "Total {:.2}, average {:.2}, overall {}",
        result.total_score,
        result.average_score,
        result.overall_band()
    );
    if result.sdb_flag {
        println!("Social desirability flag raised: most SDB answers were high.");
    }
    if let Some(expert) = result.expert_id {
        println!("Reviewed by expert {expert}");
    }
    if !result.cluster_scores.is_empty() {
        println!("\n{}", score_table("Cluster", &result.cluster_scores));
    }
    if !result.construct_scores.is_empty() {
        println!("\n{}", score_table("Construct", &result.construct_scores));
    }
}

/// One row per aggregate: name, average, answer count and band.
pub fn score_table(kind: &str, scores: &ScoreMap) -> Table {
    let mut table = Table::new();
    table.set_header(vec![kind, "Average", "Answers", "Band"]);
    for (name, score) in scores {
        let average = score.average();
        let (count, band) = match score.as_aggregate() {
            Some(a) => (a.count.to_string(), a.category),
            None => ("-".to_string(), band_average(average)),
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{average:.2}")),
            Cell::new(count),
            Cell::new(band),
        ]);
    }
    table
}
