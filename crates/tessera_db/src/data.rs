//! Data file operations: image rows, folder rows, and the audit log.

use crate::error::{DbError, Result};
use crate::ident::quote_ident;
use crate::child_prefix;
use crate::schema::quote_literal;
use crate::types::{columns, ColumnSpec, DataLayout, FolderRow, ImageRow};
use crate::TesseraDb;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

impl TesseraDb {
    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a new, empty data file laid out for `layout`.
    ///
    /// Never overwrites: an existing file at `path` is an error.
    pub async fn create_data_file(path: impl AsRef<Path>, layout: &DataLayout) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(DbError::AlreadyExists(path.to_path_buf()));
        }

        let db = Self::open(path).await?;
        db.ensure_template_tables().await?;
        db.template_replace(&layout.controls, &layout.levels).await?;
        db.create_data_tables(&layout.image_columns, &layout.root_folder)
            .await?;

        info!(path = %path.display(), "Created empty data file");
        Ok(db)
    }

    /// Whether this file has the data file tables (as opposed to a bare template).
    pub async fn is_data_file(&self) -> Result<bool> {
        Ok(self.has_table("DataTable").await? && self.has_table("ImageSetTable").await?)
    }

    /// Fail with `WrongKind` unless this is a data file.
    pub async fn require_data_file(&self) -> Result<()> {
        if self.is_data_file().await? {
            Ok(())
        } else {
            Err(DbError::WrongKind {
                path: self.path.clone(),
                expected: "data",
            })
        }
    }

    // ========================================================================
    // Image rows
    // ========================================================================

    /// Count image rows whose folder is `scope` or lies beneath it.
    ///
    /// An empty scope counts every row.
    pub async fn data_count_in_scope(&self, scope: &str) -> Result<u64> {
        let count: i64 = if scope.is_empty() {
            sqlx::query_scalar("SELECT COUNT(*) FROM DataTable")
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM DataTable WHERE RelativePath = ?1 OR substr(RelativePath, 1, length(?2)) = ?2",
            )
            .bind(scope)
            .bind(child_prefix(scope))
            .fetch_one(&self.pool)
            .await?
        };
        Ok(count as u64)
    }

    /// Image rows whose folder is `scope` or lies beneath it, in `Id` order.
    pub async fn data_rows_in_scope(&self, scope: &str) -> Result<Vec<ImageRow>> {
        // Columns are listed explicitly: a cached `SELECT *` keeps the column
        // count it was prepared with and breaks after `data_add_column`.
        let select = self.data_select_list().await?;
        let rows = if scope.is_empty() {
            let sql = format!("SELECT {} FROM DataTable ORDER BY Id", select);
            sqlx::query(&sql).fetch_all(&self.pool).await?
        } else {
            let sql = format!(
                "SELECT {} FROM DataTable WHERE RelativePath = ?1 OR substr(RelativePath, 1, length(?2)) = ?2 ORDER BY Id",
                select
            );
            sqlx::query(&sql)
                .bind(scope)
                .bind(child_prefix(scope))
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(row_to_image).collect()
    }

    async fn data_select_list(&self) -> Result<String> {
        let names = self
            .table_columns("DataTable")
            .await?
            .iter()
            .map(|name| quote_ident(name))
            .collect::<Result<Vec<_>>>()?;
        if names.is_empty() {
            return Err(DbError::WrongKind {
                path: self.path.clone(),
                expected: "data",
            });
        }
        Ok(names.join(", "))
    }

    /// Prepare a writer that inserts image rows into this file.
    ///
    /// Values for columns this file does not have are dropped.
    pub async fn image_row_writer(&self) -> Result<ImageRowWriter<'_>> {
        let columns = self.table_columns("DataTable").await?;
        Ok(ImageRowWriter { db: self, columns })
    }

    /// Set one column of one image row.
    pub async fn data_set_value(&self, id: i64, column: &str, value: &str) -> Result<()> {
        let sql = format!(
            "UPDATE DataTable SET {} = ? WHERE Id = ?",
            quote_ident(column)?
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::invalid_state(format!("No image row with Id {}", id)));
        }
        Ok(())
    }

    /// Add a column to `DataTable`, filled with its default for existing rows.
    pub async fn data_add_column(&self, column: &ColumnSpec) -> Result<()> {
        let sql = format!(
            "ALTER TABLE DataTable ADD COLUMN {} TEXT DEFAULT {}",
            quote_ident(&column.name)?,
            quote_literal(&column.default_value)
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        debug!(column = %column.name, "Added data column");
        Ok(())
    }

    // ========================================================================
    // Folder rows
    // ========================================================================

    /// Folder rows whose path is `scope` or lies beneath it, ordered by level then path.
    pub async fn folder_rows_in_scope(&self, scope: &str) -> Result<Vec<FolderRow>> {
        let rows = if scope.is_empty() {
            sqlx::query(
                "SELECT Id, Level, FolderDataPath, FolderValues FROM FolderDataTable ORDER BY Level, FolderDataPath",
            )
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT Id, Level, FolderDataPath, FolderValues FROM FolderDataTable
                WHERE FolderDataPath = ?1 OR substr(FolderDataPath, 1, length(?2)) = ?2
                ORDER BY Level, FolderDataPath
                "#,
            )
            .bind(scope)
            .bind(child_prefix(scope))
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter()
            .map(|row| {
                let values_json: String = row.get("FolderValues");
                Ok(FolderRow {
                    id: row.get("Id"),
                    level: row.get("Level"),
                    folder_path: row.get("FolderDataPath"),
                    values: serde_json::from_str(&values_json)?,
                })
            })
            .collect()
    }

    /// Insert a folder row. The row's `id` is ignored.
    pub async fn folder_insert_row(&self, row: &FolderRow) -> Result<i64> {
        let values_json = serde_json::to_string(&row.values)?;
        let result = sqlx::query(
            "INSERT INTO FolderDataTable (Level, FolderDataPath, FolderValues) VALUES (?, ?, ?)",
        )
        .bind(row.level)
        .bind(&row.folder_path)
        .bind(values_json)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    // ========================================================================
    // Image set metadata
    // ========================================================================

    /// The audit log text; lines are separated by `\n`.
    pub async fn read_log(&self) -> Result<String> {
        let log: Option<String> = sqlx::query_scalar("SELECT Log FROM ImageSetTable WHERE Id = 1")
            .fetch_optional(&self.pool)
            .await?;
        log.ok_or_else(|| DbError::invalid_state("ImageSetTable has no metadata row"))
    }

    /// Append one line to the audit log.
    pub async fn append_log_line(&self, line: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE ImageSetTable SET Log = CASE WHEN Log = '' THEN ? ELSE Log || char(10) || ? END WHERE Id = 1",
        )
        .bind(line)
        .bind(line)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::invalid_state("ImageSetTable has no metadata row"));
        }
        Ok(())
    }

    /// Display name of the folder this data file describes.
    pub async fn read_root_folder(&self) -> Result<String> {
        let root: Option<String> =
            sqlx::query_scalar("SELECT RootFolder FROM ImageSetTable WHERE Id = 1")
                .fetch_optional(&self.pool)
                .await?;
        root.ok_or_else(|| DbError::invalid_state("ImageSetTable has no metadata row"))
    }
}

/// Inserts image rows into one data file, restricted to the columns it has.
pub struct ImageRowWriter<'a> {
    db: &'a TesseraDb,
    columns: Vec<String>,
}

impl ImageRowWriter<'_> {
    /// Insert `row` (its `id` is ignored) and return the new row id.
    pub async fn insert(&self, row: &ImageRow) -> Result<i64> {
        let mut names = vec![
            quote_ident(columns::FILE)?,
            quote_ident(columns::RELATIVE_PATH)?,
        ];
        let mut binds: Vec<&str> = vec![row.file.as_str(), row.relative_path.as_str()];

        for (name, value) in &row.values {
            if self.columns.iter().any(|c| c == name) {
                names.push(quote_ident(name)?);
                binds.push(value.as_str());
            }
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO DataTable ({}) VALUES ({})",
            names.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let result = query.execute(self.db.pool()).await?;
        Ok(result.last_insert_rowid())
    }
}

fn row_to_image(row: &SqliteRow) -> Result<ImageRow> {
    let mut values = BTreeMap::new();
    for column in row.columns() {
        let name = column.name();
        if name == columns::ID || name == columns::FILE || name == columns::RELATIVE_PATH {
            continue;
        }
        let value: Option<String> = row.try_get(column.ordinal())?;
        values.insert(name.to_string(), value.unwrap_or_default());
    }

    Ok(ImageRow {
        id: row.try_get(columns::ID)?,
        file: row.try_get(columns::FILE)?,
        relative_path: row.try_get(columns::RELATIVE_PATH)?,
        values,
    })
}
