//! Error types for the storage layer.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Storage errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database file does not exist
    #[error("Database not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Refused to create a file over an existing one
    #[error("Refusing to overwrite existing file: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The file opened is not the kind of file expected
    #[error("Not a {expected} file: {}", path.display())]
    WrongKind { path: PathBuf, expected: &'static str },

    /// A column or table name that cannot be used as an identifier
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Invalid state (missing metadata row, etc.)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    /// Create an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// True when the error originates in the filesystem or the SQLite engine,
    /// as opposed to a structural problem with the file's contents.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            DbError::Sqlx(_) | DbError::Io(_) | DbError::NotFound(_) | DbError::AlreadyExists(_)
        )
    }
}
