//! Export copy: copy the image files behind a data file's rows into a
//! destination folder.
//!
//! [`ExportEngine::prepare`] reads the rows, builds the copy plan and runs the
//! duplicate check without writing anything. [`ExportEngine::run`] then
//! copies file by file with progress and cancellation.

use crate::duplicates::{scan, Confirmation, CopyPlan, DuplicateScan, NamingMode, PlannedCopy, Verdict};
use crate::error::{Outcome, WorkerError};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::populate::field_value;
use crate::progress::{ProgressEvent, ProgressReporter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_db::{columns, ImageRow, OperationLock, TesseraDb};
use tessera_schema::ScopeSpecification;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const COPY_LABEL: &str = "Copying files";

/// Only export rows whose `field` equals `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFilter {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportRequest {
    pub data_path: PathBuf,
    /// Folder the data file's relative paths start from
    pub image_root: PathBuf,
    pub destination: PathBuf,
    pub mode: NamingMode,
    pub scope: ScopeSpecification,
    pub filter: Option<RowFilter>,
}

/// A plan that passed reading and scanning, holding the data file's lock.
#[derive(Debug)]
pub struct PreparedExport {
    pub plan: CopyPlan,
    pub scan: DuplicateScan,
    _lock: OperationLock,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub outcome: Outcome,
    pub copied: u64,
    /// Planned files whose source was missing
    pub skipped: u64,
    /// Planned files never attempted
    pub remaining: u64,
    pub total: u64,
    pub message: String,
}

impl ExportResult {
    pub fn success(&self) -> bool {
        self.outcome.is_completed()
    }

    fn aborted(total: u64, error: WorkerError, step: &str) -> Self {
        let failure = error.at(step);
        Self {
            message: format!("Export not started: {}. No files were written.", failure.detail),
            outcome: Outcome::Failed(failure),
            copied: 0,
            skipped: 0,
            remaining: total,
            total,
        }
    }
}

/// Map rows to copies. Sources resolve against `image_root`.
pub fn build_plan(rows: &[ImageRow], image_root: &Path, destination: &Path, mode: NamingMode) -> CopyPlan {
    let copies = rows
        .iter()
        .map(|row| {
            let relative = join_relative(Path::new(""), &row.relative_path).join(&row.file);
            let dest = match mode {
                NamingMode::Flatten => destination.join(&row.file),
                NamingMode::PreservePaths => destination.join(&relative),
            };
            PlannedCopy::new(image_root.join(&relative), dest)
        })
        .collect();
    CopyPlan { mode, copies }
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(base.to_path_buf(), |acc, segment| acc.join(segment))
}

#[derive(Clone)]
pub struct ExportEngine {
    fs: Arc<dyn FileSystem>,
}

impl Default for ExportEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportEngine {
    pub fn new() -> Self {
        Self::with_fs(Arc::new(LocalFileSystem))
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Lock the data file, read the rows in scope and check the plan.
    pub async fn prepare(&self, request: &ExportRequest) -> Result<PreparedExport, WorkerError> {
        let lock = OperationLock::try_acquire(&request.data_path, "export")?;

        let db = TesseraDb::open_read_only(&request.data_path).await?;
        let read = async {
            db.require_data_file().await?;
            let fields = db.table_columns("DataTable").await?;
            let rows = db.data_rows_in_scope(request.scope.as_str()).await?;
            Ok::<_, WorkerError>((fields, rows))
        }
        .await;
        db.close().await;
        let (fields, mut rows) = read?;

        if let Some(filter) = &request.filter {
            let known = filter.field != columns::ID && fields.iter().any(|f| f == &filter.field);
            if !known {
                return Err(WorkerError::InvalidRequest(format!(
                    "no field named '{}'",
                    filter.field
                )));
            }
            rows.retain(|r| field_value(r, &filter.field) == filter.value);
        }

        let plan = build_plan(&rows, &request.image_root, &request.destination, request.mode);
        let scan = scan(&plan, self.fs.as_ref());
        info!(
            planned = plan.copies.len(),
            existing = scan.existing_count,
            "Export prepared"
        );
        Ok(PreparedExport {
            plan,
            scan,
            _lock: lock,
        })
    }

    /// Copy the planned files.
    ///
    /// Refused or unanswered overwrite confirmation and in-plan collisions
    /// end the export before any write.
    pub async fn run(
        &self,
        prepared: PreparedExport,
        confirmation: Confirmation,
        reporter: &ProgressReporter,
    ) -> ExportResult {
        let total = prepared.plan.copies.len() as u64;
        let result = match prepared.scan.verdict(confirmation) {
            Verdict::Proceed => self.copy_all(&prepared.plan, reporter).await,
            Verdict::NeedsConfirmation { existing_count } => ExportResult::aborted(
                total,
                WorkerError::PolicyAbort(format!(
                    "{} destination file(s) already exist and overwriting was not confirmed",
                    existing_count
                )),
                "duplicate check",
            ),
            Verdict::Abort { reason } => {
                ExportResult::aborted(total, WorkerError::PolicyAbort(reason), "duplicate check")
            }
        };
        reporter.finish(&result.message);
        result
    }

    pub fn spawn(
        &self,
        prepared: PreparedExport,
        confirmation: Confirmation,
        reporter: Arc<ProgressReporter>,
    ) -> JoinHandle<ExportResult> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run(prepared, confirmation, &reporter).await })
    }

    async fn copy_all(&self, plan: &CopyPlan, reporter: &ProgressReporter) -> ExportResult {
        let total = plan.copies.len() as u64;
        let mut copied = 0u64;
        let mut skipped = 0u64;

        for (index, copy) in plan.copies.iter().enumerate() {
            let done = index as u64;
            if reporter.is_cancellation_requested() {
                return ExportResult {
                    outcome: Outcome::Cancelled,
                    copied,
                    skipped,
                    remaining: total - done,
                    total,
                    message: format!(
                        "Export cancelled: {} copied, {} skipped, {} not attempted. Copied files were kept.",
                        copied,
                        skipped,
                        total - done
                    ),
                };
            }

            if !self.fs.exists(&copy.source) {
                warn!(source = %copy.source.display(), "Source image missing, skipped");
                skipped += 1;
            } else {
                let written = match copy.destination.parent() {
                    Some(parent) => self.fs.create_dir_all(parent),
                    None => Ok(()),
                }
                .and_then(|()| self.fs.copy(&copy.source, &copy.destination, true));
                if let Err(e) = written {
                    let failure = WorkerError::from(e).at(format!("copy {}", copy.source.display()));
                    return ExportResult {
                        message: format!(
                            "Export failed: {}. {} copied, {} skipped, {} not attempted.",
                            failure,
                            copied,
                            skipped,
                            total - done
                        ),
                        outcome: Outcome::Failed(failure),
                        copied,
                        skipped,
                        remaining: total - done,
                        total,
                    };
                }
                copied += 1;
            }

            reporter.report_units(COPY_LABEL, done + 1, total).await;
        }

        if total == 0 {
            reporter
                .report(ProgressEvent::units(COPY_LABEL, 0, 0).with_cancellable(false))
                .await;
        }

        info!(copied, skipped, "Export complete");
        ExportResult {
            outcome: Outcome::Completed,
            copied,
            skipped,
            remaining: 0,
            total,
            message: format!("Exported {} file(s), skipped {} missing.", copied, skipped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(file: &str, relative_path: &str) -> ImageRow {
        ImageRow {
            id: 0,
            file: file.to_string(),
            relative_path: relative_path.to_string(),
            values: BTreeMap::new(),
        }
    }

    #[test]
    fn test_build_plan_modes() {
        let rows = vec![row("f1.jpg", ""), row("f1.jpg", "sub/a")];
        let root = Path::new("/photos");
        let out = Path::new("/out");

        let flat = build_plan(&rows, root, out, NamingMode::Flatten);
        assert_eq!(flat.copies[0].source, PathBuf::from("/photos/f1.jpg"));
        assert_eq!(flat.copies[1].source, PathBuf::from("/photos/sub/a/f1.jpg"));
        assert_eq!(flat.copies[1].destination, PathBuf::from("/out/f1.jpg"));

        let kept = build_plan(&rows, root, out, NamingMode::PreservePaths);
        assert_eq!(kept.copies[1].destination, PathBuf::from("/out/sub/a/f1.jpg"));
    }
}
