//! Failure taxonomy shared by every background operation.
//!
//! Expected failures never escape as `Err`: operations fold them into an
//! [`Outcome`] inside their result so callers can always show a summary.
//! Cancellation is an outcome, not an error.

use serde::Serialize;
use tessera_db::{DbError, LockError};
use tessera_schema::SchemaError;
use thiserror::Error;

/// Why an operation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The user declined, or policy forbade, going ahead. Nothing was written.
    PolicyAbort,
    /// A template is structurally unusable for the requested operation.
    SchemaIntegrity,
    /// The filesystem or database layer failed.
    IoFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::PolicyAbort => "aborted",
            ErrorKind::SchemaIntegrity => "template integrity error",
            ErrorKind::IoFailure => "I/O failure",
        };
        f.write_str(name)
    }
}

/// Errors raised inside operations before they are folded into an outcome.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    PolicyAbort(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl WorkerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Db(e) if e.is_io() => ErrorKind::IoFailure,
            WorkerError::Db(_) => ErrorKind::SchemaIntegrity,
            WorkerError::Schema(SchemaError::IllegalChoice(_)) => ErrorKind::PolicyAbort,
            WorkerError::Schema(e) if e.is_integrity() => ErrorKind::SchemaIntegrity,
            WorkerError::Schema(_) => ErrorKind::IoFailure,
            WorkerError::Lock(LockError::Locked { .. }) => ErrorKind::PolicyAbort,
            WorkerError::Lock(_) | WorkerError::Io(_) => ErrorKind::IoFailure,
            WorkerError::PolicyAbort(_) => ErrorKind::PolicyAbort,
            WorkerError::InvalidRequest(_) => ErrorKind::SchemaIntegrity,
        }
    }

    pub fn at(self, step: impl Into<String>) -> OperationFailure {
        OperationFailure {
            step: step.into(),
            kind: self.kind(),
            detail: self.to_string(),
        }
    }
}

/// Where and why an operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    pub step: String,
    pub kind: ErrorKind,
    pub detail: String,
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.step, self.kind, self.detail)
    }
}

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(OperationFailure),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn failure(&self) -> Option<&OperationFailure> {
        match self {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_mapping() {
        let missing = WorkerError::from(DbError::NotFound(PathBuf::from("x.ddb")));
        assert_eq!(missing.kind(), ErrorKind::IoFailure);

        let wrong = WorkerError::from(DbError::WrongKind {
            path: PathBuf::from("x.tdb"),
            expected: "data",
        });
        assert_eq!(wrong.kind(), ErrorKind::SchemaIntegrity);

        let levels = WorkerError::from(SchemaError::LevelsExceeded {
            requested: 3,
            available: 1,
        });
        assert_eq!(levels.kind(), ErrorKind::SchemaIntegrity);

        let locked = WorkerError::from(LockError::Locked {
            path: PathBuf::from("x.ddb"),
            holder: None,
        });
        assert_eq!(locked.kind(), ErrorKind::PolicyAbort);
    }

    #[test]
    fn test_failure_names_step() {
        let failure = WorkerError::PolicyAbort("declined".to_string()).at("duplicate check");
        assert_eq!(failure.to_string(), "duplicate check (aborted): declined");
    }
}
