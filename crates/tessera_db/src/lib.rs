//! SQLite storage for Tessera template and data files.
//!
//! Both artifacts are plain SQLite files:
//!
//! - a **template** holds `TemplateTable` (control definitions) and
//!   `LevelTable` (folder hierarchy levels);
//! - a **data file** holds `DataTable` (one row per image), `FolderDataTable`
//!   (per-folder metadata), `ImageSetTable` (the audit log) and an embedded
//!   copy of the template it was created from.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tessera_db::TesseraDb;
//!
//! let data = TesseraDb::open_read_only("survey.ddb").await?;
//! let rows = data.data_rows_in_scope("Site1").await?;
//! ```

mod data;
mod error;
mod ident;
pub mod lock;
mod schema;
mod template;
mod types;

pub use error::{DbError, Result};
pub use ident::quote_ident;
pub use lock::{lock_path_for, LockError, OperationLock};
pub use types::*;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle to one template or data file.
#[derive(Clone)]
pub struct TesseraDb {
    pool: SqlitePool,
    path: PathBuf,
}

impl TesseraDb {
    /// Open or create a database file at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::connect(path, connect_options(path).create_if_missing(true)).await
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DbError::NotFound(path.to_path_buf()));
        }
        Self::connect(path, connect_options(path)).await
    }

    /// Open an existing database without write access.
    pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DbError::NotFound(path.to_path_buf()));
        }
        Self::connect(path, connect_options(path).read_only(true)).await
    }

    async fn connect(path: &Path, options: SqliteConnectOptions) -> Result<Self> {
        // One connection per file keeps statement order identical to call order.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        debug!(path = %path.display(), "Database opened");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Whether a table with this name exists.
    pub async fn has_table(&self, name: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Column names of a table, in declaration order.
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
            .bind(table)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

fn connect_options(path: &Path) -> SqliteConnectOptions {
    // Files are copied as single artifacts; WAL sidecars would be left behind.
    SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Delete)
        .foreign_keys(true)
}

/// The prefix every path strictly beneath `scope` starts with.
///
/// Compared with `substr`, not `LIKE`: SQLite's `LIKE` ignores ASCII case.
pub(crate) fn child_prefix(scope: &str) -> String {
    format!("{}/", scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.tdb");

        let db = TesseraDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(db.path(), db_path.as_path());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.ddb");

        let result = TesseraDb::open_existing(&db_path).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("ro.tdb");
        let db = TesseraDb::open(&db_path).await.unwrap();
        db.ensure_template_tables().await.unwrap();
        db.close().await;

        let ro = TesseraDb::open_read_only(&db_path).await.unwrap();
        assert!(ro.has_table("TemplateTable").await.unwrap());
        let write = sqlx::query("DELETE FROM TemplateTable")
            .execute(ro.pool())
            .await;
        assert!(write.is_err());
    }

    #[test]
    fn test_child_prefix() {
        assert_eq!(child_prefix("Site1"), "Site1/");
        assert_eq!(child_prefix("a_b%c"), "a_b%c/");
    }
}
