//! Table creation for template and data files.
//!
//! All CREATE TABLE statements live here.

use crate::error::Result;
use crate::ident::quote_ident;
use crate::types::{columns, ColumnSpec};
use crate::TesseraDb;
use tracing::debug;

impl TesseraDb {
    /// Ensure the template tables exist.
    ///
    /// Every data file carries these too, holding the template it was built from.
    pub async fn ensure_template_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS TemplateTable (
                Id INTEGER PRIMARY KEY AUTOINCREMENT,
                ControlOrder INTEGER NOT NULL,
                Type TEXT NOT NULL,
                DefaultValue TEXT NOT NULL DEFAULT '',
                Label TEXT NOT NULL,
                DataLabel TEXT NOT NULL UNIQUE,
                Tooltip TEXT NOT NULL DEFAULT '',
                Width INTEGER NOT NULL DEFAULT 100,
                Copyable INTEGER NOT NULL DEFAULT 1,
                Visible INTEGER NOT NULL DEFAULT 1,
                List TEXT NOT NULL DEFAULT '[]',
                Level INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS LevelTable (
                Level INTEGER PRIMARY KEY,
                Alias TEXT NOT NULL,
                Guid TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create the data tables: `DataTable` with the given image columns,
    /// `FolderDataTable`, and the single-row `ImageSetTable`.
    pub(crate) async fn create_data_tables(
        &self,
        image_columns: &[ColumnSpec],
        root_folder: &str,
    ) -> Result<()> {
        let mut ddl = format!(
            "CREATE TABLE DataTable ({} INTEGER PRIMARY KEY AUTOINCREMENT, {} TEXT NOT NULL, {} TEXT NOT NULL DEFAULT ''",
            quote_ident(columns::ID)?,
            quote_ident(columns::FILE)?,
            quote_ident(columns::RELATIVE_PATH)?,
        );
        for column in image_columns {
            ddl.push_str(&format!(
                ", {} TEXT DEFAULT {}",
                quote_ident(&column.name)?,
                quote_literal(&column.default_value)
            ));
        }
        ddl.push(')');
        sqlx::query(&ddl).execute(&self.pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_data_relative_path ON DataTable(RelativePath)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE FolderDataTable (
                Id INTEGER PRIMARY KEY AUTOINCREMENT,
                Level INTEGER NOT NULL,
                FolderDataPath TEXT NOT NULL,
                FolderValues TEXT NOT NULL DEFAULT '{}',
                UNIQUE(Level, FolderDataPath)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE ImageSetTable (
                Id INTEGER PRIMARY KEY CHECK (Id = 1),
                Log TEXT NOT NULL DEFAULT '',
                RootFolder TEXT NOT NULL DEFAULT ''
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT INTO ImageSetTable (Id, Log, RootFolder) VALUES (1, '', ?)")
            .bind(root_folder)
            .execute(&self.pool)
            .await?;

        debug!(
            path = %self.path.display(),
            columns = image_columns.len(),
            "Data tables created"
        );
        Ok(())
    }
}

/// Render a string as a SQL literal for DDL, where binds are not allowed.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal(""), "''");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
