//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;
use tessera_db::DbError;
use tessera_schema::{SchemaError, TemplateChoice};

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    // === Common error constructors ===

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                format!(
                    "TRY: Look for similar files: ls {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| ".".to_string())
                ),
            ])
    }

    /// The file exists but is a template, not a data file (or the reverse).
    pub fn wrong_file_kind(path: &Path, expected: &str) -> Self {
        Self::new(format!("Not a {} file: {}", expected, path.display()))
            .with_context("Template files end in .tdb, data files in .ddb")
            .with_suggestion("TRY: Check the order of the arguments")
    }

    pub fn illegal_choice(choice: TemplateChoice, legal: &[TemplateChoice]) -> Self {
        let legal: Vec<&str> = legal.iter().map(TemplateChoice::as_str).collect();
        Self::new(format!("Choice '{}' is not allowed for this template", choice))
            .with_context("The template has differences that would break the data file")
            .with_suggestions([
                format!("TRY: One of: {}", legal.join(", ")),
                "TRY: Fix the template so it keeps field types and levels, then reconcile again"
                    .to_string(),
            ])
    }

    pub fn invalid_assignment(input: &str) -> Self {
        Self::new(format!("Invalid filter: '{}'", input))
            .with_context("Filters are written FIELD=VALUE")
            .with_suggestion("TRY: --where Species=deer")
    }
}

impl From<SchemaError> for HelpfulError {
    fn from(err: SchemaError) -> Self {
        match &err {
            SchemaError::InvalidScope { path, reason } => {
                Self::new(format!("Invalid scope '{}': {}", path, reason)).with_suggestions([
                    "TRY: Give the folder relative to the data file's root, e.g. Site1/Cam2",
                    "TRY: Use an empty scope (\"\") for the whole tree",
                ])
            }
            SchemaError::LevelsExceeded {
                requested,
                available,
            } => Self::new(err.to_string())
                .with_context(format!(
                    "The scope is {} folder(s) deep but the template has {} level(s)",
                    requested, available
                ))
                .with_suggestion("TRY: Choose a shallower folder"),
            SchemaError::Storage(DbError::NotFound(path)) => Self::file_not_found(path),
            SchemaError::Storage(DbError::WrongKind { path, expected }) => {
                Self::wrong_file_kind(path, expected)
            }
            _ => Self::new(err.to_string()),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as JSON on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let value = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({ "error": format!("{:#}", err) }),
    };
    println!("{}", value);
}
