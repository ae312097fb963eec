//! Shared fixtures: a master template + data file pair on disk.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tessera_db::{FolderRow, ImageRow, TesseraDb};
use tessera_schema::{create_data_file, ControlField, ControlType, SchemaDefinition, TemplateStore};
use tessera_worker::{
    CancellationToken, ProgressEvent, ProgressReporter, ProgressSettings, ProgressSink,
};

pub struct Master {
    pub schema_path: PathBuf,
    pub data_path: PathBuf,
}

pub fn survey_template() -> SchemaDefinition {
    SchemaDefinition::with_standard_controls()
        .with_level("Project")
        .with_level("Site")
        .with_level("Camera")
        .with_control(ControlField::new("Species", ControlType::FixedChoice).with_choices(["deer", "elk"]))
        .with_control(ControlField::new("Observer", ControlType::Note))
        .with_control(ControlField::new("Funding", ControlType::Note).with_level(1))
        .with_control(ControlField::new("Habitat", ControlType::Note).with_level(2))
        .with_control(ControlField::new("Model", ControlType::Note).with_level(3))
}

/// Master with one image per `(relative_path, file)` and folder rows for
/// "", "A", "A/B" and "C".
pub async fn create_master(dir: &Path, images: &[(&str, &str)]) -> Master {
    let schema_path = dir.join("survey.tdb");
    let data_path = dir.join("survey.ddb");
    let template = survey_template();

    TemplateStore::create(&schema_path, &template)
        .await
        .unwrap()
        .close()
        .await;
    let db = create_data_file(&data_path, &template, "Survey").await.unwrap();

    let writer = db.image_row_writer().await.unwrap();
    for (relative_path, file) in images {
        let mut values = BTreeMap::new();
        values.insert("Species".to_string(), "deer".to_string());
        values.insert("Observer".to_string(), format!("obs-{}", file));
        writer
            .insert(&ImageRow {
                id: 0,
                file: file.to_string(),
                relative_path: relative_path.to_string(),
                values,
            })
            .await
            .unwrap();
    }

    for (level, path, key, value) in [
        (1, "", "Funding", "grant-7"),
        (2, "A", "Habitat", "forest"),
        (3, "A/B", "Model", "X100"),
        (2, "C", "Habitat", "meadow"),
    ] {
        let mut values = BTreeMap::new();
        values.insert(key.to_string(), value.to_string());
        db.folder_insert_row(&FolderRow {
            id: 0,
            level,
            folder_path: path.to_string(),
            values,
        })
        .await
        .unwrap();
    }

    db.close().await;
    Master {
        schema_path,
        data_path,
    }
}

pub async fn read_log(data_path: &Path) -> String {
    let db = TesseraDb::open_read_only(data_path).await.unwrap();
    let log = db.read_log().await.unwrap();
    db.close().await;
    log
}

pub async fn read_rows(data_path: &Path) -> Vec<ImageRow> {
    let db = TesseraDb::open_read_only(data_path).await.unwrap();
    let rows = db.data_rows_in_scope("").await.unwrap();
    db.close().await;
    rows
}

pub async fn read_folders(data_path: &Path) -> Vec<FolderRow> {
    let db = TesseraDb::open_read_only(data_path).await.unwrap();
    let rows = db.folder_rows_in_scope("").await.unwrap();
    db.close().await;
    rows
}

pub fn unthrottled(sink: Arc<dyn ProgressSink>) -> ProgressReporter {
    ProgressReporter::new(sink).with_settings(ProgressSettings::unthrottled())
}

/// Requests cancellation once it has seen `after` events with `label`.
pub struct CancelAfter {
    label: &'static str,
    after: usize,
    seen: AtomicUsize,
    token: CancellationToken,
}

impl CancelAfter {
    pub fn new(label: &'static str, after: usize, token: CancellationToken) -> Self {
        Self {
            label,
            after,
            seen: AtomicUsize::new(0),
            token,
        }
    }
}

impl ProgressSink for CancelAfter {
    fn on_progress(&self, event: &ProgressEvent) {
        if event.label == self.label {
            let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if seen == self.after {
                self.token.cancel();
            }
        }
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
