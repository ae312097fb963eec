//! Row-level types shared by template and data files.
//!
//! These mirror table rows one to one. Interpretation (control types,
//! hierarchy rules) belongs to `tessera_schema`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column names fixed by the data file layout.
pub mod columns {
    pub const ID: &str = "Id";
    pub const FILE: &str = "File";
    pub const RELATIVE_PATH: &str = "RelativePath";
}

/// One row of `TemplateTable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRecord {
    pub control_order: i64,
    pub control_type: String,
    pub default_value: String,
    pub label: String,
    pub data_label: String,
    pub tooltip: String,
    pub width: i64,
    pub copyable: bool,
    pub visible: bool,
    /// JSON array of choice items
    pub list: String,
    pub level: i64,
}

/// One row of `LevelTable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub level: i64,
    pub alias: String,
    pub guid: String,
}

/// A column to create in `DataTable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub default_value: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: default_value.into(),
        }
    }
}

/// Everything needed to lay down an empty data file.
#[derive(Debug, Clone)]
pub struct DataLayout {
    /// Image-level columns beyond `Id`, `File` and `RelativePath`.
    pub image_columns: Vec<ColumnSpec>,
    /// Template snapshot embedded in the data file.
    pub controls: Vec<ControlRecord>,
    pub levels: Vec<LevelRecord>,
    /// Display name of the folder the data file describes.
    pub root_folder: String,
}

/// One image row of `DataTable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub id: i64,
    pub file: String,
    /// Folder of the image relative to the data file's root, `/`-separated.
    pub relative_path: String,
    /// Every other column by name. NULLs read back as empty strings.
    pub values: BTreeMap<String, String>,
}

/// One row of `FolderDataTable`: metadata recorded for a folder at a level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRow {
    pub id: i64,
    pub level: i64,
    pub folder_path: String,
    pub values: BTreeMap<String, String>,
}
