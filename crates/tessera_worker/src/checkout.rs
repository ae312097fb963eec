//! Checkout: carve an independent template + data file pair out of a master
//! data file, restricted to one folder scope.
//!
//! Steps run strictly in order and each can fail on its own:
//!
//! 1. allocate destination names that do not exist yet
//! 2. copy the master template to the destination
//! 3. derive the scoped template in place
//! 4. create an empty data file for the scoped template
//! 5. copy in-scope folder and image rows, rewriting paths
//! 6. append one line to the master's log
//!
//! Nothing is rolled back. Files created before a failure or cancellation
//! stay on disk and are listed in the result. The master log is only touched
//! after step 5 has copied every row.

use crate::cancel::CancellationToken;
use crate::error::{ErrorKind, OperationFailure, Outcome, WorkerError};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::naming::{stem_or, unique_path};
use crate::progress::{ProgressEvent, ProgressReporter};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_db::{FolderRow, ImageRow, OperationLock, TesseraDb};
use tessera_schema::{
    create_data_file, derive_scoped_schema, ScopeSpecification, SchemaDefinition, TemplateStore,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const ROW_COPY_LABEL: &str = "Copying rows";

/// What to check out. Moved into the operation when it starts.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub master_data_path: PathBuf,
    pub master_schema_path: PathBuf,
    pub scope: ScopeSpecification,
    pub destination_folder: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckoutStep {
    Preflight,
    NameAllocation,
    SchemaCopy,
    SchemaScoping,
    DataFileCreation,
    RowCopy,
    AuditAppend,
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckoutStep::Preflight => "preflight",
            CheckoutStep::NameAllocation => "name allocation",
            CheckoutStep::SchemaCopy => "template copy",
            CheckoutStep::SchemaScoping => "template scoping",
            CheckoutStep::DataFileCreation => "data file creation",
            CheckoutStep::RowCopy => "row copy",
            CheckoutStep::AuditAppend => "log append",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub outcome: Outcome,
    pub created_schema_path: Option<PathBuf>,
    pub created_data_path: Option<PathBuf>,
    pub rows_copied: u64,
    pub rows_total: u64,
    pub folder_rows_copied: u64,
    pub message: String,
    /// Files this run created that are still on disk
    pub leftover_artifacts: Vec<PathBuf>,
}

impl CheckoutResult {
    pub fn success(&self) -> bool {
        self.outcome.is_completed()
    }
}

/// Runs checkouts.
#[derive(Clone)]
pub struct CheckoutEngine {
    fs: Arc<dyn FileSystem>,
}

impl Default for CheckoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutEngine {
    pub fn new() -> Self {
        Self::with_fs(Arc::new(LocalFileSystem))
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Run a checkout to completion, cancellation or failure.
    ///
    /// Holds the master data file's operation lock throughout.
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        reporter: &ProgressReporter,
    ) -> CheckoutResult {
        info!(
            master = %request.master_data_path.display(),
            scope = %request.scope,
            destination = %request.destination_folder.display(),
            "Checkout started"
        );

        let mut run = CheckoutRun::new(&request, self.fs.as_ref(), reporter);
        let outcome = run.execute().await;
        let result = run.into_result(outcome);

        match &result.outcome {
            Outcome::Completed => info!(rows = result.rows_copied, "Checkout complete"),
            Outcome::Cancelled => info!(
                rows = result.rows_copied,
                total = result.rows_total,
                "Checkout cancelled"
            ),
            Outcome::Failed(failure) => warn!(%failure, "Checkout failed"),
        }
        reporter.finish(&result.message);
        result
    }

    /// Run a checkout on a background task.
    pub fn spawn(&self, request: CheckoutRequest, reporter: Arc<ProgressReporter>) -> CheckoutHandle {
        let engine = self.clone();
        let token = reporter.token();
        let join = tokio::spawn(async move { engine.checkout(request, &reporter).await });
        CheckoutHandle { token, join }
    }
}

/// A checkout running in the background.
pub struct CheckoutHandle {
    token: CancellationToken,
    join: JoinHandle<CheckoutResult>,
}

impl CheckoutHandle {
    /// Ask the checkout to stop at the next row. Returns immediately.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the checkout to return.
    pub async fn wait(self) -> CheckoutResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                let failure = OperationFailure {
                    step: "checkout task".to_string(),
                    kind: ErrorKind::IoFailure,
                    detail: e.to_string(),
                };
                CheckoutResult {
                    message: format!("Checkout stopped unexpectedly: {}", failure),
                    outcome: Outcome::Failed(failure),
                    created_schema_path: None,
                    created_data_path: None,
                    rows_copied: 0,
                    rows_total: 0,
                    folder_rows_copied: 0,
                    leftover_artifacts: Vec::new(),
                }
            }
        }
    }
}

enum Stop {
    Cancelled,
    Failed(CheckoutStep, WorkerError),
}

/// State of one checkout as it moves through the steps.
struct CheckoutRun<'a> {
    request: &'a CheckoutRequest,
    fs: &'a dyn FileSystem,
    reporter: &'a ProgressReporter,
    schema_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
    rows_copied: u64,
    rows_total: u64,
    folder_rows_copied: u64,
}

impl<'a> CheckoutRun<'a> {
    fn new(
        request: &'a CheckoutRequest,
        fs: &'a dyn FileSystem,
        reporter: &'a ProgressReporter,
    ) -> Self {
        Self {
            request,
            fs,
            reporter,
            schema_path: None,
            data_path: None,
            rows_copied: 0,
            rows_total: 0,
            folder_rows_copied: 0,
        }
    }

    async fn execute(&mut self) -> Result<(), Stop> {
        let request = self.request;
        let _lock = OperationLock::try_acquire(&request.master_data_path, "checkout")
            .map_err(|e| Stop::Failed(CheckoutStep::Preflight, e.into()))?;

        self.reporter
            .report(ProgressEvent::indeterminate("Preparing checkout"))
            .await;
        let root_folder = self
            .preflight()
            .await
            .map_err(|e| Stop::Failed(CheckoutStep::Preflight, e))?;
        self.check_cancelled()?;

        // 1. names
        self.fs
            .create_dir_all(&request.destination_folder)
            .map_err(|e| Stop::Failed(CheckoutStep::NameAllocation, e.into()))?;
        let schema_dest = unique_path(
            self.fs,
            &request.destination_folder,
            &stem_or(&request.master_schema_path, "template"),
            "tdb",
        );
        let data_dest = unique_path(
            self.fs,
            &request.destination_folder,
            &stem_or(&request.master_data_path, "data"),
            "ddb",
        );
        debug!(schema = %schema_dest.display(), data = %data_dest.display(), "Allocated names");

        // 2. template copy
        self.reporter
            .report(ProgressEvent::indeterminate("Copying template"))
            .await;
        self.fs
            .copy(&request.master_schema_path, &schema_dest, false)
            .map_err(|e| Stop::Failed(CheckoutStep::SchemaCopy, e.into()))?;
        self.schema_path = Some(schema_dest.clone());

        // 3. template scoping
        let scoped = self
            .scope_template(&schema_dest)
            .await
            .map_err(|e| Stop::Failed(CheckoutStep::SchemaScoping, e))?;

        // 4. empty data file
        let child = create_data_file(&data_dest, &scoped, &root_folder)
            .await
            .map_err(|e| Stop::Failed(CheckoutStep::DataFileCreation, e.into()))?;
        self.data_path = Some(data_dest.clone());

        // 5. rows
        let copied = self.copy_rows(&child).await;
        child.close().await;
        copied?;

        // 6. log
        self.append_audit_line(&data_dest)
            .await
            .map_err(|e| Stop::Failed(CheckoutStep::AuditAppend, e))?;

        self.reporter
            .report(ProgressEvent::units("Checkout complete", 1, 1).with_cancellable(false))
            .await;
        Ok(())
    }

    /// Validate the master and count the rows in scope. Returns the child's
    /// root folder name.
    async fn preflight(&mut self) -> Result<String, WorkerError> {
        let request = self.request;
        if !self.fs.exists(&request.master_schema_path) {
            return Err(tessera_db::DbError::NotFound(request.master_schema_path.clone()).into());
        }
        let master = TesseraDb::open_read_only(&request.master_data_path).await?;
        let checked = async {
            master.require_data_file().await?;
            let total = master.data_count_in_scope(request.scope.as_str()).await?;
            let root = master.read_root_folder().await?;
            Ok::<_, WorkerError>((total, root))
        }
        .await;
        master.close().await;
        let (total, master_root) = checked?;

        self.rows_total = total;
        Ok(request
            .scope
            .last_segment()
            .map(str::to_string)
            .unwrap_or(master_root))
    }

    async fn scope_template(
        &self,
        schema_path: &Path,
    ) -> Result<SchemaDefinition, WorkerError> {
        let store = TemplateStore::open(schema_path).await?;
        let scoped = async {
            let schema = store.read().await?;
            let scoped = derive_scoped_schema(&schema, self.request.scope.levels_to_ignore())?;
            store.write(&scoped).await?;
            Ok::<_, WorkerError>(scoped)
        }
        .await;
        store.close().await;
        scoped
    }

    async fn copy_rows(&mut self, child: &TesseraDb) -> Result<(), Stop> {
        let request = self.request;
        let scope = &request.scope;
        let fail = |e: WorkerError| Stop::Failed(CheckoutStep::RowCopy, e);

        let master = TesseraDb::open_read_only(&request.master_data_path)
            .await
            .map_err(|e| fail(e.into()))?;
        let read = async {
            let folders = master.folder_rows_in_scope(scope.as_str()).await?;
            let images = master.data_rows_in_scope(scope.as_str()).await?;
            Ok::<_, WorkerError>((folders, images))
        }
        .await;
        master.close().await;
        let (folders, images) = read.map_err(fail)?;
        self.rows_total = images.len() as u64;

        let ignored = scope.levels_to_ignore() as i64;
        for folder in folders.iter().filter(|f| f.level > ignored) {
            let Some(path) = scope.rewrite(&folder.folder_path) else {
                continue;
            };
            child
                .folder_insert_row(&FolderRow {
                    id: 0,
                    level: folder.level - ignored,
                    folder_path: path.to_string(),
                    values: folder.values.clone(),
                })
                .await
                .map_err(|e| fail(e.into()))?;
            self.folder_rows_copied += 1;
        }

        let writer = child.image_row_writer().await.map_err(|e| fail(e.into()))?;
        for image in &images {
            self.check_cancelled()?;
            let Some(path) = scope.rewrite(&image.relative_path) else {
                continue;
            };
            writer
                .insert(&ImageRow {
                    id: 0,
                    file: image.file.clone(),
                    relative_path: path.to_string(),
                    values: image.values.clone(),
                })
                .await
                .map_err(|e| fail(e.into()))?;
            self.rows_copied += 1;
            self.reporter
                .report_units(ROW_COPY_LABEL, self.rows_copied, self.rows_total)
                .await;
        }
        Ok(())
    }

    async fn append_audit_line(&self, data_dest: &Path) -> Result<(), WorkerError> {
        let line = format!(
            "{}: checked out '{}' to {}",
            Utc::now().to_rfc3339(),
            self.request.scope,
            data_dest.display()
        );
        let master = TesseraDb::open_existing(&self.request.master_data_path).await?;
        let appended = master.append_log_line(&line).await;
        master.close().await;
        appended?;
        debug!(%line, "Appended checkout to master log");
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), Stop> {
        if self.reporter.is_cancellation_requested() {
            Err(Stop::Cancelled)
        } else {
            Ok(())
        }
    }

    fn leftovers(&self) -> Vec<PathBuf> {
        [&self.schema_path, &self.data_path]
            .into_iter()
            .flatten()
            .filter(|p| self.fs.exists(p))
            .cloned()
            .collect()
    }

    fn into_result(self, stopped: Result<(), Stop>) -> CheckoutResult {
        let leftover_artifacts = self.leftovers();
        let left_behind = if leftover_artifacts.is_empty() {
            "No files were created.".to_string()
        } else {
            format!(
                "Left on disk, not removed: {}.",
                leftover_artifacts
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };

        let (outcome, message) = match stopped {
            Ok(()) => (
                Outcome::Completed,
                format!(
                    "Checked out {} row(s) to {}.",
                    self.rows_copied,
                    self.data_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ),
            ),
            Err(Stop::Cancelled) => (
                Outcome::Cancelled,
                format!(
                    "Checkout cancelled after {} of {} row(s); copied rows were kept. {}",
                    self.rows_copied, self.rows_total, left_behind
                ),
            ),
            Err(Stop::Failed(step, error)) => {
                let mut failure = error.at(step.to_string());
                if step == CheckoutStep::DataFileCreation {
                    failure.detail = format!("could not create empty database: {}", failure.detail);
                }
                let message = format!(
                    "Checkout failed during {}: {}. {} of {} row(s) copied. {}",
                    step, failure.detail, self.rows_copied, self.rows_total, left_behind
                );
                (Outcome::Failed(failure), message)
            }
        };

        CheckoutResult {
            outcome,
            created_schema_path: self.schema_path,
            created_data_path: self.data_path,
            rows_copied: self.rows_copied,
            rows_total: self.rows_total,
            folder_rows_copied: self.folder_rows_copied,
            message,
            leftover_artifacts,
        }
    }
}
