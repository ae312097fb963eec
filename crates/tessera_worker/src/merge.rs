//! Merge planning for checked-out data files.
//!
//! Only planning exists: a plan says how a child's rows line up with the
//! master's rows in the same scope, and whether the child's template still
//! matches the master's scoped template. Applying a plan is left to
//! implementations of [`MergeBack`] that do not exist yet.

use crate::error::WorkerError;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tessera_db::{ImageRow, TesseraDb};
use tessera_schema::{
    classify, derive_scoped_schema, load_template, CompatibilityReport, ScopeSpecification,
};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct MergeRequest {
    pub child_schema_path: PathBuf,
    pub child_data_path: PathBuf,
    pub master_schema_path: PathBuf,
    pub master_data_path: PathBuf,
    /// Scope the child was checked out with
    pub scope: ScopeSpecification,
}

/// A child folder path and where it lives in the master.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RewrittenPath {
    pub child: String,
    pub master: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergePlan {
    /// Master scoped template (old) against the child's template (new)
    pub compatibility: CompatibilityReport,
    pub child_rows: usize,
    pub master_rows_in_scope: usize,
    /// Child rows with a master row at the same folder and file name
    pub matched_rows: usize,
    /// Child rows the master does not have
    pub new_in_child: usize,
    /// Master rows in scope the child does not have
    pub missing_in_child: usize,
    pub rewritten_paths: Vec<RewrittenPath>,
}

impl MergePlan {
    /// The child's template can be merged without breaking the master.
    pub fn is_mergeable(&self) -> bool {
        !self.compatibility.has_errors()
    }
}

/// Bringing a checked-out child back into its master.
#[allow(async_fn_in_trait)]
pub trait MergeBack {
    async fn plan(&self, request: &MergeRequest) -> Result<MergePlan, WorkerError>;
}

/// Pairs rows by relative folder and file name. No conflict detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPartitionMerge;

impl MergeBack for PathPartitionMerge {
    async fn plan(&self, request: &MergeRequest) -> Result<MergePlan, WorkerError> {
        let master_schema = load_template(&request.master_schema_path).await?;
        let scoped = derive_scoped_schema(&master_schema, request.scope.levels_to_ignore())?;
        let child_schema = load_template(&request.child_schema_path).await?;
        let compatibility = classify(&scoped, &child_schema);

        let child_rows = read_rows(&request.child_data_path, "").await?;
        let master_rows = read_rows(&request.master_data_path, request.scope.as_str()).await?;

        let master_keys: HashSet<(String, String)> = master_rows
            .iter()
            .map(|r| (r.relative_path.clone(), r.file.clone()))
            .collect();

        let mut matched_keys = HashSet::new();
        let mut matched_rows = 0;
        let mut rewritten = BTreeSet::new();
        for row in &child_rows {
            let key = (request.scope.restore(&row.relative_path), row.file.clone());
            if master_keys.contains(&key) {
                matched_rows += 1;
                matched_keys.insert(key.clone());
            }
            rewritten.insert(RewrittenPath {
                child: row.relative_path.clone(),
                master: key.0,
            });
        }

        let plan = MergePlan {
            compatibility,
            child_rows: child_rows.len(),
            master_rows_in_scope: master_rows.len(),
            matched_rows,
            new_in_child: child_rows.len() - matched_rows,
            missing_in_child: master_keys.len() - matched_keys.len(),
            rewritten_paths: rewritten.into_iter().collect(),
        };

        info!(
            child = plan.child_rows,
            matched = plan.matched_rows,
            new = plan.new_in_child,
            missing = plan.missing_in_child,
            "Merge plan built"
        );
        Ok(plan)
    }
}

async fn read_rows(path: &std::path::Path, scope: &str) -> Result<Vec<ImageRow>, WorkerError> {
    let db = TesseraDb::open_read_only(path).await?;
    let rows = async {
        db.require_data_file().await?;
        db.data_rows_in_scope(scope).await
    }
    .await;
    db.close().await;
    Ok(rows?)
}
