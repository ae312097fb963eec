//! Opening a template together with a data file.
//!
//! The data file carries the template it was created from. [`reconcile`]
//! classifies that embedded template against the template file, and
//! [`apply_choice`] carries out the user's decision.

use crate::compatibility::{classify, CompatibilityReport, TemplateChoice};
use crate::error::SchemaError;
use crate::storage::{load_template, TemplateStore};
use crate::template::{ControlType, SchemaDefinition};
use std::path::{Path, PathBuf};
use tessera_db::{ColumnSpec, TesseraDb};
use tracing::info;

/// Both templates and how they differ.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub data_path: PathBuf,
    /// Template embedded in the data file
    pub embedded: SchemaDefinition,
    /// Template read from the template file
    pub template: SchemaDefinition,
    pub report: CompatibilityReport,
}

/// What [`apply_choice`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedChoice {
    /// The data file now embeds the new template.
    Updated { columns_added: Vec<String> },
    /// The data file keeps its own template.
    KeptOld,
    Aborted,
}

/// Classify the template embedded in `data_path` against `template_path`.
pub async fn reconcile(
    template_path: impl AsRef<Path>,
    data_path: impl AsRef<Path>,
) -> Result<Reconciliation, SchemaError> {
    let data_path = data_path.as_ref();
    let template = load_template(template_path).await?;

    let store = TemplateStore::open_read_only(data_path).await?;
    store.db().require_data_file().await?;
    let embedded = store.read().await;
    store.close().await;
    let embedded = embedded?;

    let report = classify(&embedded, &template);
    info!(
        data = %data_path.display(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "Template reconciled"
    );

    Ok(Reconciliation {
        data_path: data_path.to_path_buf(),
        embedded,
        template,
        report,
    })
}

/// Carry out `choice` for a reconciliation.
///
/// Fails with [`SchemaError::IllegalChoice`] if the report forbids it.
/// Choosing the new template adds a column for every new image-level field
/// and replaces the embedded template.
pub async fn apply_choice(
    reconciliation: &Reconciliation,
    choice: TemplateChoice,
) -> Result<AppliedChoice, SchemaError> {
    match reconciliation.report.resolve(choice)? {
        TemplateChoice::Abort => Ok(AppliedChoice::Aborted),
        TemplateChoice::UseOldTemplate => Ok(AppliedChoice::KeptOld),
        TemplateChoice::UseNewTemplate => {
            let db = TesseraDb::open_existing(&reconciliation.data_path).await?;
            db.require_data_file().await?;
            let result = adopt_template(&db, &reconciliation.template).await;
            db.close().await;
            result
        }
    }
}

async fn adopt_template(
    db: &TesseraDb,
    template: &SchemaDefinition,
) -> Result<AppliedChoice, SchemaError> {
    template.validate()?;
    let existing = db.table_columns("DataTable").await?;

    let mut columns_added = Vec::new();
    for control in template.image_controls() {
        if matches!(
            control.control_type,
            ControlType::File | ControlType::RelativePath
        ) || existing.iter().any(|c| c == &control.data_label)
        {
            continue;
        }
        db.data_add_column(&ColumnSpec::new(
            control.data_label.clone(),
            control.default_value.clone(),
        ))
        .await?;
        columns_added.push(control.data_label.clone());
    }

    let store = TemplateStore::from_db(db.clone());
    store.write(template).await?;

    info!(
        data = %db.path().display(),
        added = columns_added.len(),
        "Data file now uses the new template"
    );
    Ok(AppliedChoice::Updated { columns_added })
}
