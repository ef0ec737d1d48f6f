mod common;

use assert_cmd::Command;
use common::{LOOKUP, MANIFEST, TestWorkspace};
use predicates::prelude::*;
use predicates::str::contains;

fn acs_tracts() -> Command {
    Command::cargo_bin("acs-tracts").expect("binary exists")
}

#[test]
fn lookup_prints_cells_with_column_names() {
    let workspace = TestWorkspace::new();
    let lookup = workspace.write("lookup.txt", LOOKUP);
    acs_tracts()
        .args([
            "lookup",
            "--lookup",
            lookup.to_str().unwrap(),
            "--title",
            "SEX BY AGE",
            "--subject",
            "Age-Sex",
        ])
        .assert()
        .success()
        .stdout(contains("age__b01001__total").and(contains("Male:")));
}

#[test]
fn lookup_fails_for_unknown_title() {
    let workspace = TestWorkspace::new();
    let lookup = workspace.write("lookup.txt", LOOKUP);
    acs_tracts()
        .args([
            "lookup",
            "-l",
            lookup.to_str().unwrap(),
            "-t",
            "NOT A TABLE",
        ])
        .assert()
        .failure()
        .stderr(contains("was not found"));
}

#[test]
fn manifest_lists_only_selected_tables() {
    let workspace = TestWorkspace::new();
    let manifest = workspace.write("manifest.csv", MANIFEST);
    acs_tracts()
        .args(["manifest", "-i", manifest.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("B01001").and(contains("B19013").not()));
}

#[test]
fn geos_counts_tracts_per_state_and_writes_csv() {
    let workspace = TestWorkspace::new();
    workspace.write_two_state_archives();
    let raw = workspace.raw_dir();
    acs_tracts()
        .args(["geos", "--archives", raw.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("AK").and(contains("DC")));

    let output = workspace.path().join("geos.csv");
    acs_tracts()
        .args([
            "geos",
            "-a",
            raw.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();
    let written = std::fs::read_to_string(&output).expect("registry csv");
    assert_eq!(written.lines().count(), 4);
    assert!(written.contains("\"02013000100\""));
}

#[test]
fn run_prints_report_and_writes_dataset() {
    let workspace = TestWorkspace::new();
    let config = workspace.pipeline_config(MANIFEST);
    let path_arg = |p: Option<std::path::PathBuf>| p.expect("configured").display().to_string();
    let args = [
        "run".to_string(),
        "--raw-dir".to_string(),
        path_arg(config.raw_dir.clone()),
        "--interim-dir".to_string(),
        path_arg(config.interim_dir.clone()),
        "--processed-dir".to_string(),
        path_arg(config.processed_dir.clone()),
        "--lookup".to_string(),
        path_arg(config.lookup_path.clone()),
        "--manifest".to_string(),
        path_arg(config.manifest_path.clone()),
    ];
    acs_tracts()
        .args(&args)
        .assert()
        .success()
        .stdout(contains("joined_rebuilt").and(contains("decoded")));
    assert!(
        workspace
            .path()
            .join("processed/acs__joined_tables.csv")
            .exists()
    );
    assert!(
        workspace
            .path()
            .join("processed/acs__joined_tables.meta.json")
            .exists()
    );
}

#[test]
fn config_file_is_applied_and_validated() {
    let workspace = TestWorkspace::new();
    let config = workspace.write("pipeline.yaml", "acs_span: 3\n");
    acs_tracts()
        .args(["run", "--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("acs_span must be either 1 or 5"));
}

#[test]
fn span_flag_overrides_config_file() {
    let workspace = TestWorkspace::new();
    let config = workspace.write("pipeline.yaml", "acs_span: 1\n");
    acs_tracts()
        .args(["parse", "--config", config.to_str().unwrap(), "--span", "2"])
        .assert()
        .failure()
        .stderr(contains("got 2"));
}
