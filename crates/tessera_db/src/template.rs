//! Template table operations (`TemplateTable`, `LevelTable`).

use crate::error::Result;
use crate::types::{ControlRecord, LevelRecord};
use crate::TesseraDb;
use sqlx::Row;

impl TesseraDb {
    /// Read all controls ordered by `ControlOrder`.
    pub async fn template_read_controls(&self) -> Result<Vec<ControlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT ControlOrder, Type, DefaultValue, Label, DataLabel, Tooltip,
                   Width, Copyable, Visible, List, Level
            FROM TemplateTable
            ORDER BY ControlOrder, Id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_control).collect())
    }

    /// Read all hierarchy levels ordered by level number.
    pub async fn template_read_levels(&self) -> Result<Vec<LevelRecord>> {
        let rows = sqlx::query("SELECT Level, Alias, Guid FROM LevelTable ORDER BY Level")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| LevelRecord {
                level: row.get("Level"),
                alias: row.get("Alias"),
                guid: row.get("Guid"),
            })
            .collect())
    }

    /// Replace the stored template with the given controls and levels.
    ///
    /// Runs in one transaction: readers see either the old or the new template.
    pub async fn template_replace(
        &self,
        controls: &[ControlRecord],
        levels: &[LevelRecord],
    ) -> Result<()> {
        self.ensure_template_tables().await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM TemplateTable")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM LevelTable")
            .execute(&mut *tx)
            .await?;

        for control in controls {
            sqlx::query(
                r#"
                INSERT INTO TemplateTable
                    (ControlOrder, Type, DefaultValue, Label, DataLabel, Tooltip, Width, Copyable, Visible, List, Level)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(control.control_order)
            .bind(&control.control_type)
            .bind(&control.default_value)
            .bind(&control.label)
            .bind(&control.data_label)
            .bind(&control.tooltip)
            .bind(control.width)
            .bind(control.copyable)
            .bind(control.visible)
            .bind(&control.list)
            .bind(control.level)
            .execute(&mut *tx)
            .await?;
        }

        for level in levels {
            sqlx::query("INSERT INTO LevelTable (Level, Alias, Guid) VALUES (?, ?, ?)")
                .bind(level.level)
                .bind(&level.alias)
                .bind(&level.guid)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn row_to_control(row: &sqlx::sqlite::SqliteRow) -> ControlRecord {
    ControlRecord {
        control_order: row.get("ControlOrder"),
        control_type: row.get("Type"),
        default_value: row.get("DefaultValue"),
        label: row.get("Label"),
        data_label: row.get("DataLabel"),
        tooltip: row.get("Tooltip"),
        width: row.get("Width"),
        copyable: row.get("Copyable"),
        visible: row.get("Visible"),
        list: row.get("List"),
        level: row.get("Level"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn control(order: i64, data_label: &str, level: i64) -> ControlRecord {
        ControlRecord {
            control_order: order,
            control_type: "Note".to_string(),
            default_value: String::new(),
            label: data_label.to_string(),
            data_label: data_label.to_string(),
            tooltip: String::new(),
            width: 100,
            copyable: true,
            visible: true,
            list: "[]".to_string(),
            level,
        }
    }

    #[tokio::test]
    async fn test_template_roundtrip_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.tdb")).await.unwrap();

        let controls = vec![control(2, "Notes", 0), control(1, "Site", 1)];
        let levels = vec![LevelRecord {
            level: 1,
            alias: "Site".to_string(),
            guid: "g-1".to_string(),
        }];
        db.template_replace(&controls, &levels).await.unwrap();

        let read = db.template_read_controls().await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].data_label, "Site");
        assert_eq!(read[1].data_label, "Notes");
        assert_eq!(db.template_read_levels().await.unwrap(), levels);
    }

    #[tokio::test]
    async fn test_template_replace_discards_previous() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.tdb")).await.unwrap();

        db.template_replace(&[control(1, "A", 0), control(2, "B", 0)], &[])
            .await
            .unwrap();
        db.template_replace(&[control(1, "C", 0)], &[]).await.unwrap();

        let read = db.template_read_controls().await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].data_label, "C");
    }
}
