//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const EXAMPLE_BANK: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../banks/example.toml");

fn compass() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("compass").unwrap()
}

/// A command running in `dir` that ignores any user-level config.
fn compass_in(dir: &Path) -> Command {
    let mut cmd = compass();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("COMPASS_STATE")
        .env_remove("COMPASS_SEED");
    cmd
}

fn imported() -> TempDir {
    let dir = TempDir::new().unwrap();
    compass_in(dir.path())
        .args(["import", "--bank", EXAMPLE_BANK])
        .assert()
        .success();
    dir
}

fn question_ids(dir: &Path, test_id: u64) -> Vec<u64> {
    let output = compass_in(dir)
        .args(["take", "--test", &test_id.to_string(), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let session: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    session["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["question_id"].as_u64().unwrap())
        .collect()
}

fn submit_all(dir: &Path, test_id: u64, user_id: u64, value: u8) {
    let mut cmd = compass_in(dir);
    cmd.args([
        "submit",
        "--test",
        &test_id.to_string(),
        "--user",
        &user_id.to_string(),
    ]);
    for id in question_ids(dir, test_id) {
        cmd.arg("--answer").arg(format!("{id}={value}"));
    }
    cmd.assert().success();
}

#[test]
fn validate_example_bank() {
    compass()
        .arg("validate")
        .arg("--bank")
        .arg("../../banks/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Leadership Compass"))
        .stdout(predicate::str::contains("15 questions"))
        .stdout(predicate::str::contains("All item banks valid"));
}

#[test]
fn validate_directory() {
    compass()
        .arg("validate")
        .arg("--bank")
        .arg("../../banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Leadership Compass"));
}

#[test]
fn validate_reports_authoring_warnings() {
    let dir = TempDir::new().unwrap();
    let bank = dir.path().join("bank.toml");
    std::fs::write(
        &bank,
        r#"
[bank]
name = "Sloppy"

[[clusters]]
id = 1
name = "Drive"

[[clusters.constructs]]
id = 10
name = "Grit"

[[clusters.constructs.questions]]
id = 100
text = "I never lie."
category = "sdb"

[[tests]]
id = 1
title = "Too greedy"
clusters = [{ cluster_id = 1, p = 2 }]
"#,
    )
    .unwrap();

    compass()
        .arg("validate")
        .arg("--bank")
        .arg(&bank)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[question 100] WARNING: SDB question is included in construct aggregates",
        ))
        .stdout(predicate::str::contains(
            "cluster 1 requests 2 P questions but only 0 are active",
        ))
        .stdout(predicate::str::contains("2 warning(s) found."));
}

#[test]
fn validate_nonexistent_file() {
    compass()
        .arg("validate")
        .arg("--bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    compass_in(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created compass.toml"))
        .stdout(predicate::str::contains("Created banks/example.toml"));

    assert!(dir.path().join("compass.toml").exists());
    assert!(dir.path().join("banks/example.toml").exists());

    // The generated config must load.
    compass_in(dir.path())
        .args(["import", "--bank", "banks/example.toml"])
        .assert()
        .success();
    assert!(dir.path().join("compass-state.json").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    compass_in(dir.path()).arg("init").assert().success();

    compass_in(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists, skipping"));
}

#[test]
fn help_output() {
    compass()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Psychometric"));
}

#[test]
fn version_output() {
    compass()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("compass"));
}

#[test]
fn import_assembles_every_test() {
    let dir = TempDir::new().unwrap();

    compass_in(dir.path())
        .args(["import", "--bank", EXAMPLE_BANK])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Imported Leadership Compass: 2 clusters, 4 constructs, 15 questions, 2 tests",
        ));

    assert_eq!(question_ids(dir.path(), 1).len(), 10);
    // Unrestricted Drive: every active Drive question.
    let mut drive = question_ids(dir.path(), 2);
    drive.sort_unstable();
    assert_eq!(drive, vec![100, 101, 102, 103, 110, 111, 112]);
}

#[test]
fn import_refuses_to_overwrite_state() {
    let dir = imported();

    compass_in(dir.path())
        .args(["import", "--bank", EXAMPLE_BANK])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    compass_in(dir.path())
        .args(["import", "--bank", EXAMPLE_BANK, "--force"])
        .assert()
        .success();
}

#[test]
fn import_rejects_repeated_ids() {
    let dir = TempDir::new().unwrap();
    let bank = dir.path().join("bank.toml");
    std::fs::write(
        &bank,
        r#"
[bank]
name = "Repeated"

[[clusters]]
id = 1
name = "Drive"

[[clusters.constructs]]
id = 10
name = "Grit"

[[clusters.constructs.questions]]
id = 100
text = "I finish what I start."
category = "P"

[[clusters.constructs.questions]]
id = 100
text = "I keep going after setbacks."
category = "P"
"#,
    )
    .unwrap();

    compass_in(dir.path())
        .args(["import", "--bank", bank.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate question ID: 100"))
        .stderr(predicate::str::contains("item bank is inconsistent"));

    assert!(!dir.path().join("compass-state.json").exists());
}

#[test]
fn commands_need_a_state_file() {
    let dir = TempDir::new().unwrap();

    compass_in(dir.path())
        .args(["take", "--test", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("state file not found"));
}

#[test]
fn take_lists_questions_and_scale() {
    let dir = imported();

    compass_in(dir.path())
        .args(["take", "--test", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Leadership Compass"))
        .stdout(predicate::str::contains("Strongly Agree"));
}

#[test]
fn submit_and_list_results() {
    let dir = imported();
    submit_all(dir.path(), 1, 3, 4);

    compass_in(dir.path())
        .args(["results", "--user", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));

    let output = compass_in(dir.path())
        .args(["results", "--result", "1", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["result"]["user_id"], 3);
    assert_eq!(body["result"]["status"], "completed");
    // Both SDB answers are 4, so all of them are high.
    assert_eq!(body["result"]["sdb_flag"], true);
    assert_eq!(body["answers"].as_array().unwrap().len(), 10);
    assert_eq!(body["answers"][0]["order_no"], 1);
}

#[test]
fn submit_rejects_foreign_question() {
    let dir = imported();

    // 213 is inactive and never assembled.
    compass_in(dir.path())
        .args(["submit", "--test", "1", "--user", "3", "--answer", "213=4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not part of test 1"));

    compass_in(dir.path())
        .args(["results", "--test", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found."));
}

#[test]
fn submit_rejects_out_of_range_value() {
    let dir = imported();
    let id = question_ids(dir.path(), 1)[0];

    compass_in(dir.path())
        .args(["submit", "--test", "1", "--user", "3", "--answer"])
        .arg(format!("{id}=6"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn submit_reads_answers_file() {
    let dir = imported();
    let answers: Vec<serde_json::Value> = question_ids(dir.path(), 2)
        .into_iter()
        .map(|id| serde_json::json!({ "question_id": id, "value": 5 }))
        .collect();
    let path = dir.path().join("answers.json");
    std::fs::write(&path, serde_json::to_string(&answers).unwrap()).unwrap();

    compass_in(dir.path())
        .args(["submit", "--test", "2", "--user", "8", "--answers"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Submitted 7 answers"))
        .stdout(predicate::str::contains("Drive"));
}

#[test]
fn review_marks_result() {
    let dir = imported();
    submit_all(dir.path(), 1, 3, 3);

    compass_in(dir.path())
        .args(["review", "--result", "1", "--expert", "9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("marked reviewed by expert 9"));

    compass_in(dir.path())
        .args(["results", "--result", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reviewed by expert 9"));
}

#[test]
fn report_renders_html_with_summary() {
    let dir = imported();
    submit_all(dir.path(), 1, 3, 5);

    compass_in(dir.path())
        .args([
            "report",
            "--result",
            "1",
            "--summary",
            "Strong drive",
            "--format",
            "html",
            "--output",
            "out",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("written to"));

    let html = std::fs::read_to_string(dir.path().join("out/report-1.html")).unwrap();
    assert!(html.contains("Strong drive"));
    assert!(html.contains("<svg"));
    assert!(html.contains("Connection"));

    // Text set earlier survives a later render.
    compass_in(dir.path())
        .args(["report", "--result", "1", "--output", "out"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("out/report-1.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["summary"], "Strong drive");
    assert_eq!(json["chart"]["maxValue"], 5.0);
}

#[test]
fn report_rejects_unknown_format() {
    let dir = imported();
    submit_all(dir.path(), 1, 3, 5);

    compass_in(dir.path())
        .args(["report", "--result", "1", "--format", "pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn quota_changes_apply_on_next_assembly() {
    let dir = imported();

    compass_in(dir.path())
        .args(["quota", "--test", "2", "--set", "2:1:1:0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cluster 2: P=1 R=1 SDB=0"))
        .stdout(predicate::str::contains("compass assemble --test 2"));

    // Untouched until regenerated.
    assert_eq!(question_ids(dir.path(), 2).len(), 7);

    compass_in(dir.path())
        .args(["assemble", "--test", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("9 of 9 requested"));
    assert_eq!(question_ids(dir.path(), 2).len(), 9);

    compass_in(dir.path())
        .args(["quota", "--test", "2", "--detach", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cluster 2").not());
}

#[test]
fn shortfall_is_reported_on_assembly() {
    let dir = imported();

    compass_in(dir.path())
        .args(["quota", "--test", "1", "--set", "1:3:1:4"])
        .assert()
        .success();

    compass_in(dir.path())
        .args(["assemble", "--test", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Cluster 'Drive': only 1 SDB questions available, requested 4",
        ));
}

#[test]
fn new_test_with_clusters_is_assembled() {
    let dir = imported();

    compass_in(dir.path())
        .args(["new-test", "--title", "Connection Only", "--cluster", "2:2:1:0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created test 3: Connection Only"));

    assert_eq!(question_ids(dir.path(), 3).len(), 3);
}

#[test]
fn inactive_test_cannot_be_taken() {
    let dir = imported();

    compass_in(dir.path())
        .args(["new-test", "--title", "Draft", "--inactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing assembled"));

    compass_in(dir.path())
        .args(["take", "--test", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not active"));
}
