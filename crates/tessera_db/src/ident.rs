//! Identifier quoting for user-defined column names.
//!
//! Data labels become `DataTable` columns, so they reach SQL text directly.
//! Everything else goes through bind parameters.

use crate::error::{DbError, Result};

/// Quote a column or table name for SQLite.
///
/// Embedded double quotes are doubled. Empty names and names containing NUL
/// are rejected.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.trim().is_empty() || name.contains('\0') {
        return Err(DbError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
