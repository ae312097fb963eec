//! Template types
//!
//! A template is an ordered list of controls (annotation fields) plus the
//! folder hierarchy levels those controls may attach to. Level 0 is the
//! image level; levels 1..=N describe folders, level 1 being the root.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tessera_db::{ColumnSpec, ControlRecord, DataLayout, LevelRecord};
use uuid::Uuid;

/// The kind of input a control presents and the values it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    File,
    RelativePath,
    DateTime,
    DeleteFlag,
    Note,
    FixedChoice,
    MultiChoice,
    Counter,
    IntegerAny,
    IntegerPositive,
    DecimalAny,
    DecimalPositive,
    Flag,
    Date,
    Time,
}

/// How a control's values are interpreted once stored.
///
/// Two control types with the same storage class can read each other's
/// values; anything else cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    Text,
    Integer,
    Decimal,
    Boolean,
    Temporal,
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageClass::Text => "text",
            StorageClass::Integer => "integer",
            StorageClass::Decimal => "decimal",
            StorageClass::Boolean => "boolean",
            StorageClass::Temporal => "temporal",
        };
        f.write_str(name)
    }
}

impl ControlType {
    pub const ALL: [ControlType; 15] = [
        ControlType::File,
        ControlType::RelativePath,
        ControlType::DateTime,
        ControlType::DeleteFlag,
        ControlType::Note,
        ControlType::FixedChoice,
        ControlType::MultiChoice,
        ControlType::Counter,
        ControlType::IntegerAny,
        ControlType::IntegerPositive,
        ControlType::DecimalAny,
        ControlType::DecimalPositive,
        ControlType::Flag,
        ControlType::Date,
        ControlType::Time,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::File => "File",
            ControlType::RelativePath => "RelativePath",
            ControlType::DateTime => "DateTime",
            ControlType::DeleteFlag => "DeleteFlag",
            ControlType::Note => "Note",
            ControlType::FixedChoice => "FixedChoice",
            ControlType::MultiChoice => "MultiChoice",
            ControlType::Counter => "Counter",
            ControlType::IntegerAny => "IntegerAny",
            ControlType::IntegerPositive => "IntegerPositive",
            ControlType::DecimalAny => "DecimalAny",
            ControlType::DecimalPositive => "DecimalPositive",
            ControlType::Flag => "Flag",
            ControlType::Date => "Date",
            ControlType::Time => "Time",
        }
    }

    /// Standard controls exist in every template and are always image-level.
    pub fn is_standard(&self) -> bool {
        matches!(
            self,
            ControlType::File
                | ControlType::RelativePath
                | ControlType::DateTime
                | ControlType::DeleteFlag
        )
    }

    pub fn storage_class(&self) -> StorageClass {
        match self {
            ControlType::File
            | ControlType::RelativePath
            | ControlType::Note
            | ControlType::FixedChoice
            | ControlType::MultiChoice => StorageClass::Text,
            ControlType::Counter | ControlType::IntegerAny | ControlType::IntegerPositive => {
                StorageClass::Integer
            }
            ControlType::DecimalAny | ControlType::DecimalPositive => StorageClass::Decimal,
            ControlType::DeleteFlag | ControlType::Flag => StorageClass::Boolean,
            ControlType::DateTime | ControlType::Date | ControlType::Time => StorageClass::Temporal,
        }
    }

    /// Value a new row gets when the template does not say otherwise.
    pub fn default_value(&self) -> &'static str {
        match self {
            ControlType::DeleteFlag | ControlType::Flag => "false",
            ControlType::Counter => "0",
            _ => "",
        }
    }
}

impl std::fmt::Display for ControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown control type '{}'", s))
    }
}

/// One annotation field of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlField {
    /// Text shown next to the control
    pub label: String,
    /// Stable name; the data file column (or folder value key) it is stored under
    pub data_label: String,
    pub control_type: ControlType,
    /// 0 = image level, otherwise the folder level it belongs to
    pub level: u32,
    pub default_value: String,
    pub tooltip: String,
    /// Choice items for FixedChoice and MultiChoice
    pub list: Vec<String>,
    pub visible: bool,
    pub copyable: bool,
    pub width: u32,
    pub control_order: u32,
}

impl ControlField {
    pub fn new(data_label: impl Into<String>, control_type: ControlType) -> Self {
        let data_label = data_label.into();
        Self {
            label: data_label.clone(),
            data_label,
            control_type,
            level: 0,
            default_value: control_type.default_value().to_string(),
            tooltip: String::new(),
            list: Vec::new(),
            visible: true,
            copyable: !control_type.is_standard(),
            width: 100,
            control_order: 0,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = default_value.into();
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = tooltip.into();
        self
    }

    pub fn with_choices<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order(mut self, control_order: u32) -> Self {
        self.control_order = control_order;
        self
    }

    pub fn is_image_level(&self) -> bool {
        self.level == 0
    }

    fn to_record(&self) -> Result<ControlRecord, SchemaError> {
        Ok(ControlRecord {
            control_order: i64::from(self.control_order),
            control_type: self.control_type.as_str().to_string(),
            default_value: self.default_value.clone(),
            label: self.label.clone(),
            data_label: self.data_label.clone(),
            tooltip: self.tooltip.clone(),
            width: i64::from(self.width),
            copyable: self.copyable,
            visible: self.visible,
            list: serde_json::to_string(&self.list)?,
            level: i64::from(self.level),
        })
    }

    fn from_record(record: &ControlRecord) -> Result<Self, SchemaError> {
        let control_type = record.control_type.parse::<ControlType>().map_err(|_| {
            SchemaError::UnknownControlType {
                data_label: record.data_label.clone(),
                control_type: record.control_type.clone(),
            }
        })?;
        let list: Vec<String> = if record.list.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&record.list)?
        };

        Ok(Self {
            label: record.label.clone(),
            data_label: record.data_label.clone(),
            control_type,
            level: non_negative(record.level, "Level", &record.data_label)?,
            default_value: record.default_value.clone(),
            tooltip: record.tooltip.clone(),
            list,
            visible: record.visible,
            copyable: record.copyable,
            width: non_negative(record.width, "Width", &record.data_label)?,
            control_order: non_negative(record.control_order, "ControlOrder", &record.data_label)?,
        })
    }
}

fn non_negative(value: i64, field: &str, data_label: &str) -> Result<u32, SchemaError> {
    u32::try_from(value).map_err(|_| {
        SchemaError::malformed(format!("{} of '{}' out of range: {}", field, data_label, value))
    })
}

/// A folder hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// 1-based; level 1 is the root folder
    pub level: u32,
    pub alias: String,
    pub guid: String,
}

impl LevelInfo {
    pub fn new(level: u32, alias: impl Into<String>) -> Self {
        Self {
            level,
            alias: alias.into(),
            guid: Uuid::new_v4().to_string(),
        }
    }
}

/// A complete template: controls in display order plus hierarchy levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub controls: Vec<ControlField>,
    pub levels: Vec<LevelInfo>,
}

impl SchemaDefinition {
    pub fn new(controls: Vec<ControlField>, levels: Vec<LevelInfo>) -> Self {
        Self { controls, levels }
    }

    /// A template holding only the four standard controls.
    pub fn with_standard_controls() -> Self {
        let mut schema = Self::default();
        for control_type in [
            ControlType::File,
            ControlType::RelativePath,
            ControlType::DateTime,
            ControlType::DeleteFlag,
        ] {
            schema.push_control(ControlField::new(control_type.as_str(), control_type));
        }
        schema
    }

    /// Append a control. An order of 0 places it after every existing control.
    pub fn push_control(&mut self, mut control: ControlField) {
        if control.control_order == 0 {
            control.control_order = self
                .controls
                .iter()
                .map(|c| c.control_order)
                .max()
                .unwrap_or(0)
                + 1;
        }
        self.controls.push(control);
    }

    pub fn with_control(mut self, control: ControlField) -> Self {
        self.push_control(control);
        self
    }

    /// Append a folder level below the current deepest one.
    pub fn with_level(mut self, alias: impl Into<String>) -> Self {
        let next = self.levels.len() as u32 + 1;
        self.levels.push(LevelInfo::new(next, alias));
        self
    }

    pub fn find(&self, data_label: &str) -> Option<&ControlField> {
        self.controls.iter().find(|c| c.data_label == data_label)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: u32) -> Option<&LevelInfo> {
        self.levels.iter().find(|l| l.level == level)
    }

    /// Image-level controls in display order.
    pub fn image_controls(&self) -> Vec<&ControlField> {
        let mut controls: Vec<&ControlField> =
            self.controls.iter().filter(|c| c.is_image_level()).collect();
        controls.sort_by_key(|c| c.control_order);
        controls
    }

    /// Controls attached to a folder level, in display order.
    pub fn folder_controls(&self, level: u32) -> Vec<&ControlField> {
        let mut controls: Vec<&ControlField> =
            self.controls.iter().filter(|c| c.level == level).collect();
        controls.sort_by_key(|c| c.control_order);
        controls
    }

    /// Check the structural invariants.
    ///
    /// - data labels are unique
    /// - levels are numbered 1..=N in order
    /// - every control sits at level 0 or at a defined level
    /// - standard controls are image-level
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for control in &self.controls {
            if control.data_label.trim().is_empty() {
                return Err(SchemaError::malformed("control with an empty data label"));
            }
            if !seen.insert(control.data_label.as_str()) {
                return Err(SchemaError::DuplicateDataLabel(control.data_label.clone()));
            }
        }

        for (index, level) in self.levels.iter().enumerate() {
            let expected = index as u32 + 1;
            if level.level != expected {
                return Err(SchemaError::malformed(format!(
                    "levels must be numbered contiguously from 1; found {} at position {}",
                    level.level, expected
                )));
            }
        }

        let max_level = self.levels.len() as u32;
        for control in &self.controls {
            if control.level > max_level {
                return Err(SchemaError::malformed(format!(
                    "'{}' is attached to level {} but only {} level(s) exist",
                    control.data_label, control.level, max_level
                )));
            }
            if control.control_type.is_standard() && control.level != 0 {
                return Err(SchemaError::malformed(format!(
                    "standard control '{}' must be image-level",
                    control.data_label
                )));
            }
        }

        Ok(())
    }

    /// Convert to table rows for storage.
    pub fn to_records(&self) -> Result<(Vec<ControlRecord>, Vec<LevelRecord>), SchemaError> {
        let controls = self
            .controls
            .iter()
            .map(ControlField::to_record)
            .collect::<Result<Vec<_>, _>>()?;
        let levels = self
            .levels
            .iter()
            .map(|l| LevelRecord {
                level: i64::from(l.level),
                alias: l.alias.clone(),
                guid: l.guid.clone(),
            })
            .collect();
        Ok((controls, levels))
    }

    /// Build from stored table rows. Does not validate.
    pub fn from_records(
        controls: &[ControlRecord],
        levels: &[LevelRecord],
    ) -> Result<Self, SchemaError> {
        let controls = controls
            .iter()
            .map(ControlField::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        let levels = levels
            .iter()
            .map(|l| {
                Ok(LevelInfo {
                    level: non_negative(l.level, "Level", &l.alias)?,
                    alias: l.alias.clone(),
                    guid: l.guid.clone(),
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Ok(Self { controls, levels })
    }

    /// Layout of an empty data file for this template.
    ///
    /// `File` and `RelativePath` are fixed columns of the data table, so only
    /// the remaining image-level controls become extra columns.
    pub fn data_layout(&self, root_folder: &str) -> Result<DataLayout, SchemaError> {
        self.validate()?;
        let image_columns = self
            .image_controls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c.control_type,
                    ControlType::File | ControlType::RelativePath
                )
            })
            .map(|c| ColumnSpec::new(c.data_label.clone(), c.default_value.clone()))
            .collect();
        let (controls, levels) = self.to_records()?;
        Ok(DataLayout {
            image_columns,
            controls,
            levels,
            root_folder: root_folder.to_string(),
        })
    }
}
