//! Template compatibility classification
//!
//! Compares the template a data file was created with (old) against a
//! template being opened with it (new). Differences that would leave stored
//! values unreadable or ambiguous are errors; everything else is a warning.
//!
//! An error blocks the new template: only keeping the old template or
//! aborting remains legal.

use crate::error::SchemaError;
use crate::template::{ControlField, ControlType, SchemaDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// How much a discrepancy matters for stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One difference between two templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    EmptyTemplate,
    DuplicateDataLabel {
        data_label: String,
    },
    StorageClassChanged {
        data_label: String,
        from: ControlType,
        to: ControlType,
    },
    LevelChanged {
        data_label: String,
        from: u32,
        to: u32,
    },
    RequiredFieldMissing {
        data_label: String,
    },
    FolderLevelRemoved {
        level: u32,
        alias: String,
    },
    FieldRemoved {
        data_label: String,
    },
    FieldAdded {
        data_label: String,
    },
    TypeChanged {
        data_label: String,
        from: ControlType,
        to: ControlType,
    },
    AttributeChanged {
        data_label: String,
        attribute: String,
        from: String,
        to: String,
    },
    ChoicesRemoved {
        data_label: String,
        items: Vec<String>,
    },
    ChoicesAdded {
        data_label: String,
        items: Vec<String>,
    },
    ControlsReordered,
    LevelAdded {
        level: u32,
        alias: String,
    },
    LevelAliasChanged {
        level: u32,
        from: String,
        to: String,
    },
}

impl Discrepancy {
    pub fn severity(&self) -> Severity {
        match self {
            Discrepancy::EmptyTemplate
            | Discrepancy::DuplicateDataLabel { .. }
            | Discrepancy::StorageClassChanged { .. }
            | Discrepancy::LevelChanged { .. }
            | Discrepancy::RequiredFieldMissing { .. }
            | Discrepancy::FolderLevelRemoved { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl std::fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discrepancy::EmptyTemplate => write!(f, "The template defines no controls"),
            Discrepancy::DuplicateDataLabel { data_label } => {
                write!(f, "Data label '{}' is defined more than once", data_label)
            }
            Discrepancy::StorageClassChanged {
                data_label,
                from,
                to,
            } => write!(
                f,
                "'{}' changed type {} -> {} ({} values cannot be read as {})",
                data_label,
                from,
                to,
                from.storage_class(),
                to.storage_class()
            ),
            Discrepancy::LevelChanged {
                data_label,
                from,
                to,
            } => write!(f, "'{}' moved from level {} to level {}", data_label, from, to),
            Discrepancy::RequiredFieldMissing { data_label } => {
                write!(f, "Required field '{}' is missing", data_label)
            }
            Discrepancy::FolderLevelRemoved { level, alias } => write!(
                f,
                "Folder level {} ('{}') was removed; its folder data would be lost",
                level, alias
            ),
            Discrepancy::FieldRemoved { data_label } => {
                write!(f, "Field '{}' was removed and will no longer be shown", data_label)
            }
            Discrepancy::FieldAdded { data_label } => write!(f, "Field '{}' was added", data_label),
            Discrepancy::TypeChanged {
                data_label,
                from,
                to,
            } => write!(f, "'{}' changed type {} -> {}", data_label, from, to),
            Discrepancy::AttributeChanged {
                data_label,
                attribute,
                from,
                to,
            } => write!(
                f,
                "'{}' {} changed '{}' -> '{}'",
                data_label, attribute, from, to
            ),
            Discrepancy::ChoicesRemoved { data_label, items } => write!(
                f,
                "'{}' no longer offers: {}",
                data_label,
                items.join(", ")
            ),
            Discrepancy::ChoicesAdded { data_label, items } => {
                write!(f, "'{}' now also offers: {}", data_label, items.join(", "))
            }
            Discrepancy::ControlsReordered => write!(f, "Controls were reordered"),
            Discrepancy::LevelAdded { level, alias } => {
                write!(f, "Folder level {} ('{}') was added", level, alias)
            }
            Discrepancy::LevelAliasChanged { level, from, to } => write!(
                f,
                "Folder level {} renamed '{}' -> '{}'",
                level, from, to
            ),
        }
    }
}

/// What to do with a data file whose template drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateChoice {
    UseNewTemplate,
    UseOldTemplate,
    Abort,
}

impl TemplateChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateChoice::UseNewTemplate => "new",
            TemplateChoice::UseOldTemplate => "old",
            TemplateChoice::Abort => "abort",
        }
    }
}

impl std::fmt::Display for TemplateChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" | "use-new" => Ok(TemplateChoice::UseNewTemplate),
            "old" | "use-old" => Ok(TemplateChoice::UseOldTemplate),
            "abort" => Ok(TemplateChoice::Abort),
            other => Err(format!("unknown choice '{}' (expected new, old or abort)", other)),
        }
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub discrepancies: Vec<Discrepancy>,
}

impl CompatibilityReport {
    fn push(&mut self, discrepancy: Discrepancy) {
        let message = discrepancy.to_string();
        match discrepancy.severity() {
            Severity::Error => self.errors.push(message),
            Severity::Warning => self.warnings.push(message),
        }
        self.discrepancies.push(discrepancy);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// No differences at all.
    pub fn is_identical(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn legal_choices(&self) -> Vec<TemplateChoice> {
        let mut choices = Vec::with_capacity(3);
        if !self.has_errors() {
            choices.push(TemplateChoice::UseNewTemplate);
        }
        choices.push(TemplateChoice::UseOldTemplate);
        choices.push(TemplateChoice::Abort);
        choices
    }

    pub fn is_legal(&self, choice: TemplateChoice) -> bool {
        self.legal_choices().contains(&choice)
    }

    /// Accept `choice` if it is legal for this report.
    pub fn resolve(&self, choice: TemplateChoice) -> Result<TemplateChoice, SchemaError> {
        if self.is_legal(choice) {
            Ok(choice)
        } else {
            Err(SchemaError::IllegalChoice(choice.to_string()))
        }
    }
}

/// Classify the differences between `old` and `new`. Pure.
pub fn classify(old: &SchemaDefinition, new: &SchemaDefinition) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();

    if new.controls.is_empty() {
        report.push(Discrepancy::EmptyTemplate);
        return report;
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for control in &new.controls {
        let label = control.data_label.as_str();
        if !seen.insert(label) && reported.insert(label) {
            report.push(Discrepancy::DuplicateDataLabel {
                data_label: label.to_string(),
            });
        }
    }

    let new_by_label: HashMap<&str, &ControlField> = new
        .controls
        .iter()
        .map(|c| (c.data_label.as_str(), c))
        .collect();
    let old_labels: HashSet<&str> = old.controls.iter().map(|c| c.data_label.as_str()).collect();

    for old_control in &old.controls {
        match new_by_label.get(old_control.data_label.as_str()) {
            None if old_control.control_type.is_standard() => {
                report.push(Discrepancy::RequiredFieldMissing {
                    data_label: old_control.data_label.clone(),
                });
            }
            None => report.push(Discrepancy::FieldRemoved {
                data_label: old_control.data_label.clone(),
            }),
            Some(new_control) => compare_control(&mut report, old_control, new_control),
        }
    }

    for control in &new.controls {
        if !old_labels.contains(control.data_label.as_str())
            && seen.remove(control.data_label.as_str())
        {
            report.push(Discrepancy::FieldAdded {
                data_label: control.data_label.clone(),
            });
        }
    }

    if common_order(old, &new_by_label) != common_order_in(new, &old_labels) {
        report.push(Discrepancy::ControlsReordered);
    }

    for old_level in &old.levels {
        match new.level(old_level.level) {
            None => report.push(Discrepancy::FolderLevelRemoved {
                level: old_level.level,
                alias: old_level.alias.clone(),
            }),
            Some(new_level) if new_level.alias != old_level.alias => {
                report.push(Discrepancy::LevelAliasChanged {
                    level: old_level.level,
                    from: old_level.alias.clone(),
                    to: new_level.alias.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for new_level in &new.levels {
        if old.level(new_level.level).is_none() {
            report.push(Discrepancy::LevelAdded {
                level: new_level.level,
                alias: new_level.alias.clone(),
            });
        }
    }

    report
}

fn compare_control(report: &mut CompatibilityReport, old: &ControlField, new: &ControlField) {
    let data_label = &old.data_label;

    if old.control_type != new.control_type {
        if old.control_type.storage_class() != new.control_type.storage_class() {
            report.push(Discrepancy::StorageClassChanged {
                data_label: data_label.clone(),
                from: old.control_type,
                to: new.control_type,
            });
        } else {
            report.push(Discrepancy::TypeChanged {
                data_label: data_label.clone(),
                from: old.control_type,
                to: new.control_type,
            });
        }
    }

    if old.level != new.level {
        report.push(Discrepancy::LevelChanged {
            data_label: data_label.clone(),
            from: old.level,
            to: new.level,
        });
    }

    let attributes: [(&str, String, String); 6] = [
        ("label", old.label.clone(), new.label.clone()),
        ("tooltip", old.tooltip.clone(), new.tooltip.clone()),
        ("default value", old.default_value.clone(), new.default_value.clone()),
        ("visibility", old.visible.to_string(), new.visible.to_string()),
        ("copyable", old.copyable.to_string(), new.copyable.to_string()),
        ("width", old.width.to_string(), new.width.to_string()),
    ];
    for (attribute, from, to) in attributes {
        if from != to {
            report.push(Discrepancy::AttributeChanged {
                data_label: data_label.clone(),
                attribute: attribute.to_string(),
                from,
                to,
            });
        }
    }

    let old_items: BTreeSet<&String> = old.list.iter().collect();
    let new_items: BTreeSet<&String> = new.list.iter().collect();
    let removed: Vec<String> = old_items.difference(&new_items).map(|s| s.to_string()).collect();
    let added: Vec<String> = new_items.difference(&old_items).map(|s| s.to_string()).collect();
    if !removed.is_empty() {
        report.push(Discrepancy::ChoicesRemoved {
            data_label: data_label.clone(),
            items: removed,
        });
    }
    if !added.is_empty() {
        report.push(Discrepancy::ChoicesAdded {
            data_label: data_label.clone(),
            items: added,
        });
    }
}

/// Data labels of `schema` that also appear in `other`, in display order.
fn common_order(schema: &SchemaDefinition, other: &HashMap<&str, &ControlField>) -> Vec<String> {
    ordered_labels(schema, |label| other.contains_key(label))
}

fn common_order_in(schema: &SchemaDefinition, other: &HashSet<&str>) -> Vec<String> {
    ordered_labels(schema, |label| other.contains(label))
}

fn ordered_labels(schema: &SchemaDefinition, keep: impl Fn(&str) -> bool) -> Vec<String> {
    let mut controls: Vec<&ControlField> = schema
        .controls
        .iter()
        .filter(|c| keep(&c.data_label))
        .collect();
    controls.sort_by_key(|c| c.control_order);
    let mut seen = HashSet::new();
    controls
        .into_iter()
        .filter(|c| seen.insert(c.data_label.as_str()))
        .map(|c| c.data_label.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SchemaDefinition {
        SchemaDefinition::with_standard_controls()
            .with_level("Site")
            .with_control(
                ControlField::new("Species", ControlType::FixedChoice)
                    .with_choices(["deer", "elk"]),
            )
            .with_control(ControlField::new("Count", ControlType::Counter))
            .with_control(ControlField::new("Habitat", ControlType::Note).with_level(1))
    }

    fn find_mut<'a>(schema: &'a mut SchemaDefinition, label: &str) -> &'a mut ControlField {
        schema
            .controls
            .iter_mut()
            .find(|c| c.data_label == label)
            .unwrap()
    }

    #[test]
    fn test_identical_templates() {
        let report = classify(&base(), &base());
        assert!(report.is_identical());
        assert!(report.is_legal(TemplateChoice::UseNewTemplate));
    }

    #[test]
    fn test_empty_new_template_is_error() {
        let report = classify(&base(), &SchemaDefinition::default());
        assert_eq!(report.discrepancies, vec![Discrepancy::EmptyTemplate]);
        assert!(report.warnings.is_empty());
        assert!(!report.is_legal(TemplateChoice::UseNewTemplate));
    }

    #[test]
    fn test_cross_class_type_change_is_error() {
        let mut new = base();
        find_mut(&mut new, "Count").control_type = ControlType::Note;
        let report = classify(&base(), &new);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.legal_choices(),
            vec![TemplateChoice::UseOldTemplate, TemplateChoice::Abort]
        );
    }

    #[test]
    fn test_same_class_type_change_is_warning() {
        let mut new = base();
        find_mut(&mut new, "Species").control_type = ControlType::Note;
        let report = classify(&base(), &new);
        assert!(report.errors.is_empty());
        assert!(matches!(
            report.discrepancies[0],
            Discrepancy::TypeChanged { .. }
        ));
    }

    #[test]
    fn test_missing_standard_field_is_error() {
        let mut new = base();
        new.controls.retain(|c| c.data_label != "DeleteFlag");
        let report = classify(&base(), &new);
        assert!(report
            .discrepancies
            .contains(&Discrepancy::RequiredFieldMissing {
                data_label: "DeleteFlag".to_string()
            }));
    }

    #[test]
    fn test_removed_user_field_is_warning() {
        let mut new = base();
        new.controls.retain(|c| c.data_label != "Count");
        let report = classify(&base(), &new);
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_level_change_and_removed_level_are_errors() {
        let mut new = base();
        find_mut(&mut new, "Habitat").level = 0;
        new.levels.clear();
        let report = classify(&base(), &new);
        assert_eq!(report.errors.len(), 2);
        assert!(report.has_errors());
    }

    #[test]
    fn test_duplicate_label_in_new_is_error() {
        let new = base().with_control(ControlField::new("Count", ControlType::Counter));
        let report = classify(&base(), &new);
        assert_eq!(
            report.discrepancies,
            vec![Discrepancy::DuplicateDataLabel {
                data_label: "Count".to_string()
            }]
        );
    }

    #[test]
    fn test_cosmetic_changes_are_warnings() {
        let mut new = base()
            .with_level("Camera")
            .with_control(ControlField::new("Observer", ControlType::Note));
        {
            let species = find_mut(&mut new, "Species");
            species.label = "Animal".to_string();
            species.list = vec!["deer".to_string(), "moose".to_string()];
        }
        new.levels[0].alias = "Location".to_string();
        let report = classify(&base(), &new);

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        // label, choice removed, choice added, field added, alias changed, level added
        assert_eq!(report.warnings.len(), 6);
        assert!(report.is_legal(TemplateChoice::UseNewTemplate));
    }

    #[test]
    fn test_reorder_is_warning() {
        let mut new = base();
        find_mut(&mut new, "Species").control_order = 99;
        let report = classify(&base(), &new);
        assert_eq!(report.discrepancies, vec![Discrepancy::ControlsReordered]);
    }

    #[test]
    fn test_resolve_rejects_illegal_choice() {
        let report = classify(&base(), &SchemaDefinition::default());
        assert!(matches!(
            report.resolve(TemplateChoice::UseNewTemplate),
            Err(SchemaError::IllegalChoice(_))
        ));
        assert_eq!(
            report.resolve(TemplateChoice::Abort).unwrap(),
            TemplateChoice::Abort
        );
    }

    #[test]
    fn test_choice_parse() {
        assert_eq!("new".parse::<TemplateChoice>().unwrap(), TemplateChoice::UseNewTemplate);
        assert_eq!("OLD".parse::<TemplateChoice>().unwrap(), TemplateChoice::UseOldTemplate);
        assert!("maybe".parse::<TemplateChoice>().is_err());
    }
}
