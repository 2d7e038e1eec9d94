//! Retiring terminal orders: blob deletion followed by record deletion.
//!
//! The two steps are not atomic. Blob failures are logged, audited and
//! swallowed so the order always disappears; only a failed record delete
//! is reported back, leaving the terminal order in place for a retry.

mod coordinator;

pub use coordinator::CleanupCoordinator;

use serde::Serialize;
use thiserror::Error;

use crate::order::OrderError;
use crate::storage::StorageNamespace;

/// Ordered list of namespaces to probe when deleting a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    namespaces: Vec<StorageNamespace>,
}

impl DeletionPlan {
    pub fn new(namespaces: Vec<StorageNamespace>) -> Self {
        Self { namespaces }
    }

    /// Build a plan from configured namespace names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(
            names
                .iter()
                .map(|n| StorageNamespace::new(n.as_ref()))
                .collect(),
        )
    }

    pub fn namespaces(&self) -> &[StorageNamespace] {
        &self.namespaces
    }
}

impl Default for DeletionPlan {
    fn default() -> Self {
        Self::new(vec![StorageNamespace::image(), StorageNamespace::raw()])
    }
}

/// One refused delete attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobAttempt {
    pub namespace: StorageNamespace,
    pub error: String,
}

/// What happened to one file's blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BlobOutcome {
    Deleted { namespace: StorageNamespace },
    /// Every namespace refused; the blob may be orphaned.
    Failed { attempts: Vec<BlobAttempt> },
    /// No handle, or blob deletion is disabled.
    Skipped,
}

/// Per-file result of a cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCleanup {
    pub name: String,
    pub handle: String,
    #[serde(flatten)]
    pub outcome: BlobOutcome,
}

/// Per-file results for one retired order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub order_id: String,
    pub files: Vec<FileCleanup>,
}

impl CleanupReport {
    pub fn deleted(&self) -> usize {
        self.count(|o| matches!(o, BlobOutcome::Deleted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, BlobOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, BlobOutcome::Skipped))
    }

    fn count(&self, pred: impl Fn(&BlobOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Result of a successful cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// The order did not exist; nothing to do.
    AlreadyGone,
    Retired(CleanupReport),
}

impl CleanupOutcome {
    pub fn existed(&self) -> bool {
        matches!(self, CleanupOutcome::Retired(_))
    }
}

/// Cleanup failures that need a manual retry.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("Failed to read order {order_id}: {source}")]
    Lookup {
        order_id: String,
        #[source]
        source: OrderError,
    },

    /// Blob deletion ran but the record could not be removed.
    #[error("Failed to delete order record {order_id}: {reason}")]
    RecordDelete {
        order_id: String,
        reason: String,
        report: CleanupReport,
    },

    /// The cleanup task panicked or was aborted before it finished.
    #[error("Cleanup task for order {order_id} did not finish: {reason}")]
    Aborted { order_id: String, reason: String },
}

impl CleanupError {
    pub fn order_id(&self) -> &str {
        match self {
            CleanupError::Lookup { order_id, .. }
            | CleanupError::RecordDelete { order_id, .. }
            | CleanupError::Aborted { order_id, .. } => order_id,
        }
    }
}
