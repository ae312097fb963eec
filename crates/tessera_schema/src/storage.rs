//! Template persistence on top of `tessera_db`.

use crate::error::SchemaError;
use crate::template::SchemaDefinition;
use std::path::Path;
use tessera_db::{DbError, TesseraDb};
use tracing::{debug, info};

/// A template (or the template embedded in a data file) on disk.
pub struct TemplateStore {
    db: TesseraDb,
}

impl TemplateStore {
    /// Open an existing template file for reading and writing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let db = TesseraDb::open_existing(path).await?;
        Ok(Self { db })
    }

    pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let db = TesseraDb::open_read_only(path).await?;
        Ok(Self { db })
    }

    /// Create a new template file. Never overwrites.
    pub async fn create(
        path: impl AsRef<Path>,
        schema: &SchemaDefinition,
    ) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(DbError::AlreadyExists(path.to_path_buf()).into());
        }
        let store = Self {
            db: TesseraDb::open(path).await?,
        };
        store.write(schema).await?;
        info!(path = %path.display(), controls = schema.controls.len(), "Created template");
        Ok(store)
    }

    /// Wrap an already open database.
    pub fn from_db(db: TesseraDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &TesseraDb {
        &self.db
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Read the stored template.
    pub async fn read(&self) -> Result<SchemaDefinition, SchemaError> {
        if !self.db.has_table("TemplateTable").await? {
            return Err(SchemaError::malformed(format!(
                "{} has no TemplateTable",
                self.db.path().display()
            )));
        }
        let controls = self.db.template_read_controls().await?;
        let levels = if self.db.has_table("LevelTable").await? {
            self.db.template_read_levels().await?
        } else {
            Vec::new()
        };
        SchemaDefinition::from_records(&controls, &levels)
    }

    /// Replace the stored template with `schema` after validating it.
    pub async fn write(&self, schema: &SchemaDefinition) -> Result<(), SchemaError> {
        schema.validate()?;
        let (controls, levels) = schema.to_records()?;
        self.db.template_replace(&controls, &levels).await?;
        debug!(path = %self.db.path().display(), "Template written");
        Ok(())
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}

/// Read the template stored at `path`.
pub async fn load_template(path: impl AsRef<Path>) -> Result<SchemaDefinition, SchemaError> {
    let store = TemplateStore::open_read_only(path).await?;
    let schema = store.read().await;
    store.close().await;
    schema
}

/// Create an empty data file for `schema` at `path`. Never overwrites.
pub async fn create_data_file(
    path: impl AsRef<Path>,
    schema: &SchemaDefinition,
    root_folder: &str,
) -> Result<TesseraDb, SchemaError> {
    let layout = schema.data_layout(root_folder)?;
    Ok(TesseraDb::create_data_file(path, &layout).await?)
}
