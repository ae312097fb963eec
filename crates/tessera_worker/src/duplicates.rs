//! Pre-flight collision check for copy plans.
//!
//! Runs before any file is written. Two passes:
//!
//! 1. count planned destinations that already exist; the caller must get
//!    explicit confirmation before overwriting them
//! 2. in [`NamingMode::Flatten`] only, find destinations that two planned
//!    copies share; such a plan is always refused

use crate::fs::FileSystem;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How source files map to destination names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NamingMode {
    /// Every file lands directly in the destination folder.
    Flatten,
    /// Files keep their relative folder below the destination.
    PreservePaths,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl PlannedCopy {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyPlan {
    pub mode: NamingMode,
    pub copies: Vec<PlannedCopy>,
}

/// Result of [`scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateScan {
    pub existing_count: usize,
    /// Destinations already on disk, in plan order
    pub existing: Vec<PathBuf>,
    /// Destinations claimed by more than one planned copy
    pub duplicate_names_within_plan: Vec<PathBuf>,
}

/// Whether the user has been asked about overwriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    NotAsked,
    Granted,
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    /// Ask the user, then call `verdict` again with the answer.
    NeedsConfirmation { existing_count: usize },
    /// Do not write anything.
    Abort { reason: String },
}

impl DuplicateScan {
    pub fn verdict(&self, confirmation: Confirmation) -> Verdict {
        if !self.duplicate_names_within_plan.is_empty() {
            return Verdict::Abort {
                reason: format!(
                    "{} destination name(s) would be written by more than one file, e.g. {}",
                    self.duplicate_names_within_plan.len(),
                    self.duplicate_names_within_plan[0].display()
                ),
            };
        }
        if self.existing_count == 0 {
            return Verdict::Proceed;
        }
        match confirmation {
            Confirmation::Granted => Verdict::Proceed,
            Confirmation::NotAsked => Verdict::NeedsConfirmation {
                existing_count: self.existing_count,
            },
            Confirmation::Refused => Verdict::Abort {
                reason: format!(
                    "Overwriting {} existing file(s) was declined",
                    self.existing_count
                ),
            },
        }
    }
}

/// Check `plan` against the filesystem and itself. Writes nothing.
pub fn scan(plan: &CopyPlan, fs: &dyn FileSystem) -> DuplicateScan {
    let existing: Vec<PathBuf> = plan
        .copies
        .iter()
        .filter(|c| fs.exists(&c.destination))
        .map(|c| c.destination.clone())
        .collect();

    let mut duplicate_names_within_plan = Vec::new();
    if plan.mode == NamingMode::Flatten {
        let mut claims: BTreeMap<&PathBuf, usize> = BTreeMap::new();
        for copy in &plan.copies {
            *claims.entry(&copy.destination).or_default() += 1;
        }
        duplicate_names_within_plan = claims
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(dest, _)| dest.clone())
            .collect();
    }

    tracing::debug!(
        planned = plan.copies.len(),
        existing = existing.len(),
        collisions = duplicate_names_within_plan.len(),
        "Duplicate scan finished"
    );

    DuplicateScan {
        existing_count: existing.len(),
        existing,
        duplicate_names_within_plan,
    }
}
