//! The `compass submit` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use compass_core::scoring::AnswerInput;

use super::{check_format, GlobalOpts, Workspace};

/// Parse `QUESTION=VALUE`.
pub fn parse_answer(raw: &str) -> Result<AnswerInput> {
    let (question, value) = raw
        .split_once('=')
        .with_context(|| format!("answer must be QUESTION=VALUE, got: {raw}"))?;
    let question_id = question
        .trim()
        .parse::<u64>()
        .with_context(|| format!("invalid question id in answer: {raw}"))?;
    let value = value
        .trim()
        .parse::<i64>()
        .with_context(|| format!("invalid value in answer: {raw}"))?;
    Ok(AnswerInput { question_id, value })
}

/// Read a JSON array of `{"question_id": .., "value": ..}` objects.
fn read_answers_file(path: &Path) -> Result<Vec<AnswerInput>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", path.display()))
}

pub async fn execute(
    opts: &GlobalOpts,
    test_id: u64,
    user_id: u64,
    answers_file: Option<PathBuf>,
    inline: Vec<String>,
    format: String,
) -> Result<()> {
    check_format(&format, &["text", "json"])?;

    let mut answers = match &answers_file {
        Some(path) => read_answers_file(path)?,
        None => Vec::new(),
    };
    for raw in &inline {
        answers.push(parse_answer(raw)?);
    }

    let workspace = Workspace::open(opts)?;
    let submission = workspace
        .scoring()
        .submit(test_id, user_id, &answers)
        .await?;
    workspace.save()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&submission.result)?);
        return Ok(());
    }

    println!(
        "Submitted {} answers ({} contributing).",
        submission.answers.len(),
        submission.scorecard.contributing
    );
    super::results::print_result(&submission.result);

    Ok(())
}
