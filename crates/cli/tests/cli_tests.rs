use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("analysis-console").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("synchronized follow-up threads"));
}

#[test]
fn test_cli_serve_help() {
    let mut cmd = Command::cargo_bin("analysis-console").unwrap();
    cmd.arg("serve").arg("--help").assert().success().stdout(predicate::str::contains("port"));
}

#[test]
fn test_cli_migrate_requires_database_url() {
    let mut cmd = Command::cargo_bin("analysis-console").unwrap();
    cmd.arg("migrate")
        .env_remove("DATABASE_URL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL must be set"));
}

#[test]
fn test_cli_thread_unknown_analysis_fails() {
    let mut cmd = Command::cargo_bin("analysis-console").unwrap();
    cmd.args(["thread", "missing-analysis"])
        .env_remove("DATABASE_URL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Analysis not found"));
}
