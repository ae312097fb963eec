//! Long-running Tessera operations.
//!
//! Every operation here runs on a background tokio task, reports throttled
//! progress through a [`ProgressReporter`], polls cancellation once per unit
//! of work and returns a result value for every ending: completed, cancelled
//! or failed. At most one operation runs per data file, enforced with the
//! advisory lock from `tessera_db`.
//!
//! - [`checkout`]: scoped template + data file pair from a master
//! - [`export`]: copy the images behind a data file's rows
//! - [`populate`]: set one field across a scope
//! - [`merge`]: plan bringing a checkout back into its master
//! - [`duplicates`]: pre-flight collision check for copy plans

pub mod cancel;
pub mod checkout;
pub mod duplicates;
pub mod error;
pub mod export;
pub mod fs;
pub mod merge;
pub mod naming;
pub mod populate;
pub mod progress;

pub use cancel::CancellationToken;
pub use checkout::{CheckoutEngine, CheckoutHandle, CheckoutRequest, CheckoutResult, CheckoutStep};
pub use duplicates::{scan, Confirmation, CopyPlan, DuplicateScan, NamingMode, PlannedCopy, Verdict};
pub use error::{ErrorKind, OperationFailure, Outcome, WorkerError};
pub use export::{ExportEngine, ExportRequest, ExportResult, PreparedExport, RowFilter};
pub use fs::{FileSystem, LocalFileSystem};
pub use merge::{MergeBack, MergePlan, MergeRequest, PathPartitionMerge};
pub use populate::{PopulateRequest, PopulateResult, PopulateSource};
pub use progress::{
    ProgressEvent, ProgressReporter, ProgressSettings, ProgressSink, RecordingSink, SilentSink,
};
