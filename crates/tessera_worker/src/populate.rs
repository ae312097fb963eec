//! Bulk field population: set one field on every image row in a scope.

use crate::error::{Outcome, WorkerError};
use crate::progress::ProgressReporter;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_db::{columns, ImageRow, OperationLock, TesseraDb};
use tessera_schema::ScopeSpecification;
use tokio::task::JoinHandle;
use tracing::info;

const POPULATE_LABEL: &str = "Updating rows";

/// Where the new value of each row comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PopulateSource {
    /// The same value for every row
    Value(String),
    /// The row's own value of another field
    CopyFrom(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateRequest {
    pub data_path: PathBuf,
    pub field: String,
    pub source: PopulateSource,
    pub scope: ScopeSpecification,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateResult {
    pub outcome: Outcome,
    pub updated: u64,
    pub total: u64,
    pub message: String,
}

impl PopulateResult {
    pub fn success(&self) -> bool {
        self.outcome.is_completed()
    }
}

/// Run a bulk population. Rows already updated when it stops keep their
/// new value.
pub async fn populate(request: PopulateRequest, reporter: &ProgressReporter) -> PopulateResult {
    let mut updated = 0u64;
    let mut total = 0u64;
    let stopped = populate_rows(&request, reporter, &mut updated, &mut total).await;

    let (outcome, message) = match stopped {
        Ok(true) => (
            Outcome::Completed,
            format!("Set '{}' on {} row(s).", request.field, updated),
        ),
        Ok(false) => (
            Outcome::Cancelled,
            format!(
                "Cancelled after updating {} of {} row(s); updated rows keep their new value.",
                updated, total
            ),
        ),
        Err((step, error)) => {
            let failure = error.at(step);
            let message = format!(
                "Population failed: {}. {} of {} row(s) were updated.",
                failure, updated, total
            );
            (Outcome::Failed(failure), message)
        }
    };

    info!(field = %request.field, updated, total, "Population finished");
    reporter.finish(&message);
    PopulateResult {
        outcome,
        updated,
        total,
        message,
    }
}

pub fn spawn(request: PopulateRequest, reporter: Arc<ProgressReporter>) -> JoinHandle<PopulateResult> {
    tokio::spawn(async move { populate(request, &reporter).await })
}

/// `Ok(true)` when every row was updated, `Ok(false)` when cancelled.
async fn populate_rows(
    request: &PopulateRequest,
    reporter: &ProgressReporter,
    updated: &mut u64,
    total: &mut u64,
) -> Result<bool, (&'static str, WorkerError)> {
    let _lock = OperationLock::try_acquire(&request.data_path, "populate")
        .map_err(|e| ("preflight", WorkerError::from(e)))?;

    let db = TesseraDb::open_existing(&request.data_path)
        .await
        .map_err(|e| ("preflight", WorkerError::from(e)))?;
    let result = async {
        let rows = prepare(&db, request)
            .await
            .map_err(|e| ("preflight", e))?;
        *total = rows.len() as u64;

        for row in &rows {
            if reporter.is_cancellation_requested() {
                return Ok(false);
            }
            let value = match &request.source {
                PopulateSource::Value(value) => value.as_str(),
                PopulateSource::CopyFrom(field) => field_value(row, field),
            };
            db.data_set_value(row.id, &request.field, value)
                .await
                .map_err(|e| ("update", WorkerError::from(e)))?;
            *updated += 1;
            reporter.report_units(POPULATE_LABEL, *updated, *total).await;
        }
        Ok::<_, (&'static str, WorkerError)>(true)
    }
    .await;
    db.close().await;
    result
}

pub(crate) fn field_value<'a>(row: &'a ImageRow, field: &str) -> &'a str {
    match field {
        columns::FILE => &row.file,
        columns::RELATIVE_PATH => &row.relative_path,
        _ => row.values.get(field).map(String::as_str).unwrap_or(""),
    }
}

async fn prepare(db: &TesseraDb, request: &PopulateRequest) -> Result<Vec<ImageRow>, WorkerError> {
    db.require_data_file().await?;
    let existing = db.table_columns("DataTable").await?;

    let writable = |name: &str| {
        existing.iter().any(|c| c == name)
            && ![columns::ID, columns::FILE, columns::RELATIVE_PATH].contains(&name)
    };
    if !writable(&request.field) {
        return Err(WorkerError::InvalidRequest(format!(
            "'{}' is not an editable field of this data file",
            request.field
        )));
    }
    if let PopulateSource::CopyFrom(from) = &request.source {
        if from == columns::ID || !existing.iter().any(|c| c == from) {
            return Err(WorkerError::InvalidRequest(format!(
                "no field named '{}' to copy from",
                from
            )));
        }
    }

    Ok(db.data_rows_in_scope(request.scope.as_str()).await?)
}
