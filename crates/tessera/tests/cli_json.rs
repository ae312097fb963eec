use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use tessera_db::ImageRow;
use tessera_schema::{
    create_data_file, ControlField, ControlType, SchemaDefinition, TemplateStore,
};

fn tessera_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tessera"))
}

fn run_cli(home: &Path, args: &[&str]) -> Output {
    Command::new(tessera_bin())
        .args(args)
        .env("TESSERA_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute tessera CLI")
}

fn parse_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "failed to parse JSON output: {}\nstdout:\n{}\nstderr:\n{}",
            err,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn template() -> SchemaDefinition {
    SchemaDefinition::with_standard_controls()
        .with_level("Site")
        .with_level("Camera")
        .with_control(ControlField::new("Species", ControlType::Note))
}

/// survey.tdb + survey.ddb with rows at "", "S1", "S1/C1" and "S2".
async fn create_master(dir: &Path) -> (PathBuf, PathBuf) {
    let schema_path = dir.join("survey.tdb");
    let data_path = dir.join("survey.ddb");
    let template = template();
    TemplateStore::create(&schema_path, &template)
        .await
        .unwrap()
        .close()
        .await;
    let db = create_data_file(&data_path, &template, "Survey")
        .await
        .unwrap();
    let writer = db.image_row_writer().await.unwrap();
    for (relative_path, file) in [
        ("", "a.jpg"),
        ("S1", "b.jpg"),
        ("S1/C1", "c.jpg"),
        ("S2", "d.jpg"),
    ] {
        writer
            .insert(&ImageRow {
                id: 0,
                file: file.to_string(),
                relative_path: relative_path.to_string(),
                values: BTreeMap::new(),
            })
            .await
            .unwrap();
    }
    db.close().await;
    (schema_path, data_path)
}

#[test]
fn test_config_json_uses_tessera_home() {
    let home = TempDir::new().unwrap();
    let output = run_cli(home.path(), &["config", "--json"]);
    assert!(output.status.success());

    let value = parse_json(&output);
    assert_eq!(value["home"], home.path().to_string_lossy().as_ref());
    assert_eq!(value["config_file"]["exists"], false);
    assert_eq!(value["settings"]["progress"]["refresh_interval_ms"], 250);
}

#[tokio::test]
async fn test_checkout_then_log() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let (schema, data) = create_master(work.path()).await;
    let dest = work.path().join("field");

    let output = run_cli(
        home.path(),
        &[
            "checkout",
            "--json",
            "--template",
            schema.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
            "--scope",
            "S1",
            "--dest",
            dest.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let result = parse_json(&output);
    assert_eq!(result["outcome"]["status"], "completed");
    assert_eq!(result["rows_copied"], 2);
    assert!(dest.join("survey.ddb").exists());

    let output = run_cli(home.path(), &["log", "--json", data.to_str().unwrap()]);
    let log = parse_json(&output);
    let lines = log["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].as_str().unwrap().contains("checked out 'S1'"));
}

#[tokio::test]
async fn test_failed_checkout_exits_nonzero() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let (schema, data) = create_master(work.path()).await;

    let output = run_cli(
        home.path(),
        &[
            "checkout",
            "--json",
            "--template",
            schema.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
            "--scope",
            "S1/C1/x",
            "--dest",
            work.path().join("field").to_str().unwrap(),
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    let result = parse_json(&output);
    assert_eq!(result["outcome"]["status"], "failed");
    assert_eq!(result["outcome"]["step"], "template scoping");
}

#[tokio::test]
async fn test_reconcile_identical_template() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let (schema, data) = create_master(work.path()).await;

    let output = run_cli(
        home.path(),
        &[
            "reconcile",
            "--json",
            "--template",
            schema.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    let value = parse_json(&output);
    assert_eq!(value["report"]["errors"].as_array().unwrap().len(), 0);
    assert_eq!(value["report"]["warnings"].as_array().unwrap().len(), 0);
    assert_eq!(value["applied"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_missing_data_file_is_a_helpful_error() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let missing = work.path().join("nope.ddb");

    let output = run_cli(home.path(), &["log", "--json", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let value = parse_json(&output);
    assert!(value["error"].as_str().unwrap().contains("File not found"));
    assert!(!value["suggestions"].as_array().unwrap().is_empty());
}
