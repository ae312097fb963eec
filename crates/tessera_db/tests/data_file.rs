//! Data file tests against real SQLite files.

use std::collections::BTreeMap;

use tempfile::TempDir;
use tessera_db::{ColumnSpec, DataLayout, DbError, FolderRow, ImageRow, TesseraDb};

fn layout() -> DataLayout {
    DataLayout {
        image_columns: vec![
            ColumnSpec::new("DateTime", ""),
            ColumnSpec::new("DeleteFlag", "false"),
            ColumnSpec::new("Species", "none"),
        ],
        controls: Vec::new(),
        levels: Vec::new(),
        root_folder: "Survey".to_string(),
    }
}

fn image(file: &str, relative_path: &str, species: &str) -> ImageRow {
    let mut values = BTreeMap::new();
    values.insert("Species".to_string(), species.to_string());
    ImageRow {
        id: 0,
        file: file.to_string(),
        relative_path: relative_path.to_string(),
        values,
    }
}

async fn seeded(tmp: &TempDir) -> TesseraDb {
    let db = TesseraDb::create_data_file(tmp.path().join("survey.ddb"), &layout())
        .await
        .unwrap();
    let writer = db.image_row_writer().await.unwrap();
    for (file, path) in [
        ("root.jpg", ""),
        ("a.jpg", "A"),
        ("ab.jpg", "A/B"),
        ("ax.jpg", "AX"),
        ("c.jpg", "C"),
    ] {
        writer.insert(&image(file, path, "deer")).await.unwrap();
    }
    db
}

#[tokio::test]
async fn test_create_refuses_existing_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("survey.ddb");
    std::fs::write(&path, b"occupied").unwrap();

    let result = TesseraDb::create_data_file(&path, &layout()).await;
    assert!(matches!(result, Err(DbError::AlreadyExists(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"occupied");
}

#[tokio::test]
async fn test_scope_filter_is_segment_exact() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    let rows = db.data_rows_in_scope("A").await.unwrap();
    let paths: Vec<&str> = rows.iter().map(|r| r.relative_path.as_str()).collect();
    // "AX" shares the characters but not the folder
    assert_eq!(paths, vec!["A", "A/B"]);
    assert_eq!(db.data_count_in_scope("A").await.unwrap(), 2);
    assert_eq!(db.data_count_in_scope("").await.unwrap(), 5);
}

#[tokio::test]
async fn test_scope_filter_is_case_sensitive() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    assert_eq!(db.data_count_in_scope("a").await.unwrap(), 0);
    assert!(db.data_rows_in_scope("a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_column_defaults_fill_missing_values() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    let rows = db.data_rows_in_scope("C").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values["Species"], "deer");
    assert_eq!(rows[0].values["DeleteFlag"], "false");
}

#[tokio::test]
async fn test_writer_drops_unknown_columns() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    let mut row = image("z.jpg", "Z", "elk");
    row.values.insert("NotAColumn".to_string(), "x".to_string());
    db.image_row_writer().await.unwrap().insert(&row).await.unwrap();

    let rows = db.data_rows_in_scope("Z").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].values.contains_key("NotAColumn"));
}

#[tokio::test]
async fn test_log_append_is_line_oriented() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    assert_eq!(db.read_log().await.unwrap(), "");
    db.append_log_line("first").await.unwrap();
    db.append_log_line("second").await.unwrap();
    assert_eq!(db.read_log().await.unwrap(), "first\nsecond");
    assert_eq!(db.read_root_folder().await.unwrap(), "Survey");
}

#[tokio::test]
async fn test_folder_rows_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    let mut values = BTreeMap::new();
    values.insert("Habitat".to_string(), "forest".to_string());
    for (level, path) in [(1, ""), (2, "A"), (3, "A/B"), (2, "C")] {
        db.folder_insert_row(&FolderRow {
            id: 0,
            level,
            folder_path: path.to_string(),
            values: values.clone(),
        })
        .await
        .unwrap();
    }

    let in_scope = db.folder_rows_in_scope("A").await.unwrap();
    assert_eq!(in_scope.len(), 2);
    assert_eq!(in_scope[0].level, 2);
    assert_eq!(in_scope[1].folder_path, "A/B");
    assert_eq!(in_scope[1].values["Habitat"], "forest");
}

#[tokio::test]
async fn test_set_value_and_add_column() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    let id = db.data_rows_in_scope("C").await.unwrap()[0].id;
    db.data_set_value(id, "Species", "moose").await.unwrap();
    db.data_add_column(&ColumnSpec::new("Observer", "unknown"))
        .await
        .unwrap();

    let row = &db.data_rows_in_scope("C").await.unwrap()[0];
    assert_eq!(row.values["Species"], "moose");
    assert_eq!(row.values["Observer"], "unknown");

    let missing = db.data_set_value(9999, "Species", "moose").await;
    assert!(matches!(missing, Err(DbError::InvalidState(_))));
}

#[tokio::test]
async fn test_bare_template_is_not_a_data_file() {
    let tmp = TempDir::new().unwrap();
    let db = TesseraDb::open(tmp.path().join("t.tdb")).await.unwrap();
    db.ensure_template_tables().await.unwrap();

    assert!(!db.is_data_file().await.unwrap());
    assert!(matches!(
        db.require_data_file().await,
        Err(DbError::WrongKind { .. })
    ));
}

#[tokio::test]
async fn test_rows_survive_added_column_on_same_handle() {
    let tmp = TempDir::new().unwrap();
    let db = seeded(&tmp).await;

    assert_eq!(db.data_rows_in_scope("").await.unwrap().len(), 5);
    db.data_add_column(&ColumnSpec::new("Count", "0"))
        .await
        .unwrap();

    let rows = db.data_rows_in_scope("").await.unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.values["Count"] == "0"));
    assert_eq!(db.data_rows_in_scope("A").await.unwrap().len(), 2);
}
