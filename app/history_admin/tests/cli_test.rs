//! history_admin 命令行测试（不需要数据库）

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_schema_prints_ddl() {
    Command::cargo_bin("history_admin")
        .unwrap()
        .env_remove("HISTORY_DATABASE_URL")
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE IF NOT EXISTS model_history_history"))
        .stdout(predicate::str::contains("UNIQUE KEY unique_source (app_label, model, source_id)"));
}

#[test]
fn test_show_without_database_url_fails() {
    Command::cargo_bin("history_admin")
        .unwrap()
        .env_remove("HISTORY_DATABASE_URL")
        .args(["show", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no database url"));
}

#[test]
fn test_missing_config_file_fails() {
    Command::cargo_bin("history_admin")
        .unwrap()
        .args(["--config", "/nonexistent/history.yaml", "schema"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
