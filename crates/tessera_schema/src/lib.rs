//! Templates for Tessera data files
//!
//! A template describes the annotation fields (controls) of a data file and
//! the folder hierarchy levels those fields can attach to. This crate owns:
//!
//! - [`template`]: the template model and its invariants
//! - [`compatibility`]: classifying differences between two templates
//! - [`scope`]: checkout scopes and deriving a template for a sub-tree
//! - [`storage`]: reading and writing templates through `tessera_db`
//! - [`reconcile`]: opening a template together with an existing data file
//!
//! Classification and derivation are pure; only `storage` and `reconcile`
//! touch disk.

pub mod compatibility;
mod error;
pub mod reconcile;
pub mod scope;
pub mod storage;
pub mod template;

pub use compatibility::{classify, CompatibilityReport, Discrepancy, Severity, TemplateChoice};
pub use error::SchemaError;
pub use reconcile::{apply_choice, reconcile, AppliedChoice, Reconciliation};
pub use scope::{derive_scoped_schema, ScopeSpecification};
pub use storage::{create_data_file, load_template, TemplateStore};
pub use template::{ControlField, ControlType, LevelInfo, SchemaDefinition, StorageClass};
