//! Checkout scopes and scoped template derivation.

use crate::error::SchemaError;
use crate::template::SchemaDefinition;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A folder inside a data file's tree, relative to its root.
///
/// Stored normalized: `/` separators, no leading or trailing separator, no
/// empty or `.` segments. The empty path is the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSpecification {
    path: String,
}

impl ScopeSpecification {
    /// Normalize a user-supplied relative folder path.
    ///
    /// `\` is accepted as a separator. Absolute paths and `..` segments are
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidScope {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let unified = raw.trim().replace('\\', "/");
        if unified.starts_with('/') {
            return Err(invalid("must be relative to the root folder"));
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(invalid("'..' is not allowed")),
                s if s.contains(':') => return Err(invalid("must be relative to the root folder")),
                s => segments.push(s),
            }
        }

        Ok(Self {
            path: segments.join("/"),
        })
    }

    /// The whole tree.
    pub fn whole_tree() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_whole_tree(&self) -> bool {
        self.path.is_empty()
    }

    /// Number of hierarchy levels above the scope folder's own contents.
    pub fn levels_to_ignore(&self) -> usize {
        self.segments().count()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Whether `relative_path` is the scope folder or lies beneath it.
    pub fn contains(&self, relative_path: &str) -> bool {
        self.rewrite(relative_path).is_some()
    }

    /// `relative_path` re-expressed relative to the scope folder, or `None`
    /// when it lies outside the scope.
    pub fn rewrite<'a>(&self, relative_path: &'a str) -> Option<&'a str> {
        if self.is_whole_tree() {
            return Some(relative_path);
        }
        let rest = relative_path.strip_prefix(self.path.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Inverse of [`rewrite`](Self::rewrite): a path relative to the scope
    /// folder expressed relative to the original root.
    pub fn restore(&self, scoped_path: &str) -> String {
        match (self.is_whole_tree(), scoped_path.is_empty()) {
            (true, _) => scoped_path.to_string(),
            (false, true) => self.path.clone(),
            (false, false) => format!("{}/{}", self.path, scoped_path),
        }
    }
}

impl std::fmt::Display for ScopeSpecification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

impl std::str::FromStr for ScopeSpecification {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Derive the template of a checkout rooted `levels_to_ignore` folders down.
///
/// Removes whatever is currently level 1, `levels_to_ignore` times. After
/// each removal the remaining levels, and the controls attached to them,
/// move up by one. Controls of removed levels are dropped; nothing else
/// about any control changes. The input is never modified.
pub fn derive_scoped_schema(
    schema: &SchemaDefinition,
    levels_to_ignore: usize,
) -> Result<SchemaDefinition, SchemaError> {
    schema.validate()?;

    let available = schema.level_count();
    if levels_to_ignore > available {
        return Err(SchemaError::LevelsExceeded {
            requested: levels_to_ignore,
            available,
        });
    }

    let mut derived = schema.clone();
    for _ in 0..levels_to_ignore {
        remove_top_level(&mut derived);
    }

    debug!(
        removed = levels_to_ignore,
        remaining = derived.level_count(),
        "Derived scoped template"
    );
    Ok(derived)
}

fn remove_top_level(schema: &mut SchemaDefinition) {
    schema.levels.retain(|l| l.level != 1);
    schema.controls.retain(|c| c.level != 1);

    for level in &mut schema.levels {
        level.level -= 1;
    }
    for control in schema.controls.iter_mut().filter(|c| c.level > 1) {
        control.level -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ControlField, ControlType};

    fn three_levels() -> SchemaDefinition {
        SchemaDefinition::with_standard_controls()
            .with_level("Project")
            .with_level("Site")
            .with_level("Camera")
            .with_control(ControlField::new("Species", ControlType::Note))
            .with_control(ControlField::new("Funding", ControlType::Note).with_level(1))
            .with_control(ControlField::new("Habitat", ControlType::Note).with_level(2))
            .with_control(ControlField::new("Model", ControlType::Note).with_level(3))
    }

    #[test]
    fn test_parse_normalizes() {
        let scope = ScopeSpecification::parse("Site1\\./Cam2/").unwrap();
        assert_eq!(scope.as_str(), "Site1/Cam2");
        assert_eq!(scope.levels_to_ignore(), 2);
        assert_eq!(scope.last_segment(), Some("Cam2"));

        let whole = ScopeSpecification::parse("  ").unwrap();
        assert!(whole.is_whole_tree());
        assert_eq!(whole.levels_to_ignore(), 0);
        assert_eq!(whole.last_segment(), None);
    }

    #[test]
    fn test_parse_rejects_escapes() {
        assert!(ScopeSpecification::parse("Site1/../Site2").is_err());
        assert!(ScopeSpecification::parse("/etc").is_err());
        assert!(ScopeSpecification::parse("C:/photos").is_err());
    }

    #[test]
    fn test_rewrite_is_segment_exact() {
        let scope = ScopeSpecification::parse("A").unwrap();
        assert_eq!(scope.rewrite("A"), Some(""));
        assert_eq!(scope.rewrite("A/B"), Some("B"));
        assert_eq!(scope.rewrite("AB"), None);
        assert_eq!(scope.rewrite(""), None);
        assert!(!scope.contains("C"));
        assert_eq!(ScopeSpecification::whole_tree().rewrite("C"), Some("C"));
    }

    #[test]
    fn test_restore_inverts_rewrite() {
        let scope = ScopeSpecification::parse("Site1/Cam2").unwrap();
        for path in ["Site1/Cam2", "Site1/Cam2/day1"] {
            let scoped = scope.rewrite(path).unwrap();
            assert_eq!(scope.restore(scoped), path);
        }
        assert_eq!(ScopeSpecification::whole_tree().restore("x/y"), "x/y");
    }

    #[test]
    fn test_derive_removes_top_levels() {
        let schema = three_levels();
        for n in 0..=3 {
            let derived = derive_scoped_schema(&schema, n).unwrap();
            assert_eq!(derived.level_count(), 3 - n);
            let numbers: Vec<u32> = derived.levels.iter().map(|l| l.level).collect();
            assert_eq!(numbers, (1..=(3 - n) as u32).collect::<Vec<_>>());
            assert!(derived.validate().is_ok());
        }
    }

    #[test]
    fn test_derive_renumbers_controls() {
        let derived = derive_scoped_schema(&three_levels(), 1).unwrap();

        assert!(derived.find("Funding").is_none());
        assert_eq!(derived.find("Habitat").unwrap().level, 1);
        assert_eq!(derived.find("Model").unwrap().level, 2);
        assert_eq!(derived.find("Species").unwrap().level, 0);
        assert_eq!(derived.levels[0].alias, "Site");
        // other attributes untouched
        assert_eq!(
            derived.find("Model").unwrap().control_order,
            three_levels().find("Model").unwrap().control_order
        );
    }

    #[test]
    fn test_derive_two_levels_keeps_only_bottom() {
        let derived = derive_scoped_schema(&three_levels(), 2).unwrap();
        assert_eq!(derived.levels.len(), 1);
        assert_eq!(derived.levels[0].alias, "Camera");
        assert_eq!(derived.folder_controls(1)[0].data_label, "Model");
        assert!(derived.find("Habitat").is_none());
    }

    #[test]
    fn test_derive_too_many_levels_fails() {
        let schema = three_levels();
        let before = schema.clone();
        let result = derive_scoped_schema(&schema, 4);
        assert!(matches!(
            result,
            Err(SchemaError::LevelsExceeded {
                requested: 4,
                available: 3
            })
        ));
        assert_eq!(schema, before);
    }
}
