use tessera_db::DbError;
use thiserror::Error;

/// Errors raised while reading, validating or transforming a template.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Cannot ignore {requested} level(s): the template defines only {available}")]
    LevelsExceeded { requested: usize, available: usize },

    #[error("Duplicate data label: {0}")]
    DuplicateDataLabel(String),

    #[error("Unknown control type '{control_type}' for '{data_label}'")]
    UnknownControlType {
        data_label: String,
        control_type: String,
    },

    #[error("Invalid scope '{path}': {reason}")]
    InvalidScope { path: String, reason: String },

    #[error("Choice '{0}' is not allowed for this template comparison")]
    IllegalChoice(String),

    #[error("Malformed template: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SchemaError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// True for errors caused by the template's structure rather than by I/O.
    pub fn is_integrity(&self) -> bool {
        match self {
            SchemaError::Storage(e) => !e.is_io(),
            SchemaError::IllegalChoice(_) => false,
            _ => true,
        }
    }
}
