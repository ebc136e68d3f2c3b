//! End-to-end CLI tests for the offline paths: dry-run import and
//! configuration validation. No network access is required.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_fixtures(dir: &Path) {
    fs::create_dir_all(dir.join("data")).unwrap();
    fs::write(
        dir.join("data/pivotal_export.csv"),
        "Id,Title,Type,Current State,Labels\n\
         1001,Mobile work,epic,,mobile\n\
         1002,Login screen,feature,started,mobile\n\
         1003,Cut release,release,unstarted,\n",
    )
    .unwrap();
    fs::write(
        dir.join("data/states.csv"),
        "pt_state,shortcut_state_id,shortcut_state_name\n\
         unstarted,500001,Ready\n\
         started,500002,In Development\n\
         accepted,500003,Done\n",
    )
    .unwrap();
    fs::write(
        dir.join("data/users.csv"),
        "pt_user_name,shortcut_user_email\nAmy Williams,amy@example.com\n",
    )
    .unwrap();
    fs::write(
        dir.join("data/priorities.csv"),
        "pt_priority,shortcut_custom_field_value_id\np2 - medium,value-uuid\n",
    )
    .unwrap();
    fs::write(
        dir.join("config.json"),
        r#"{
            "group_id": null,
            "workflow_id": 500,
            "pt_csv_file": "data/pivotal_export.csv",
            "states_csv_file": "data/states.csv",
            "users_csv_file": "data/users.csv",
            "priorities_csv_file": "data/priorities.csv",
            "priority_custom_field_id": "field-uuid",
            "epic_states": {"todo": 1, "in_progress": 2, "done": 3}
        }"#,
    )
    .unwrap();
}

fn scm(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("scm").unwrap();
    cmd.current_dir(dir).env("SHORTCUT_API_TOKEN", "test-token");
    cmd
}

#[test]
fn import_dry_run_reports_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    scm(dir.path())
        .arg("import")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run over 3 rows"))
        .stdout(predicate::str::contains("1 epic, 2 stories"))
        .stdout(predicate::str::contains("--apply"));

    // dry run must not write a manifest
    assert!(!dir.path().join("data/imported_entities.csv").exists());
}

#[test]
fn missing_token_and_config_fields_reported_together() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.json"), "{}").unwrap();

    let mut cmd = Command::cargo_bin("scm").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("SHORTCUT_API_TOKEN")
        .arg("import");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("SHORTCUT_API_TOKEN"))
        .stderr(predicate::str::contains("group_id"))
        .stderr(predicate::str::contains("pt_csv_file"))
        .stderr(predicate::str::contains("epic_states"));
}

#[test]
fn absent_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    scm(dir.path())
        .arg("import")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn delete_dry_run_summarizes_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    fs::write(
        dir.path().join("data/imported_entities.csv"),
        "id,entity_type,name,external_id,epic_id,iteration_id,app_url\n\
         10,epic,Mobile work,1001,,,https://example.com/epic/10\n\
         11,story,Login screen,1002,10,,https://example.com/story/11\n",
    )
    .unwrap();

    scm(dir.path())
        .arg("delete")
        .assert()
        .success()
        .stdout(predicate::str::contains("would delete 1 epic, 1 story"));
}

#[test]
fn row_parse_errors_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    fs::write(
        dir.path().join("data/pivotal_export.csv"),
        "Id,Title,Type,Created At\n1001,A Story,feature,yesterday\n",
    )
    .unwrap();

    scm(dir.path())
        .arg("import")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Row 2"))
        .stderr(predicate::str::contains("created at"));
}
