//! Mock object storage for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{ObjectStorage, StorageError, StorageNamespace};

/// A recorded destroy call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDestroy {
    pub handle: String,
    pub namespace: StorageNamespace,
    pub success: bool,
}

/// Mock implementation of the ObjectStorage trait.
///
/// Every call is recorded. By default every delete succeeds; namespaces can
/// be made to reject, or every call can be made to fail.
///
/// # Example
///
/// ```rust,ignore
/// use printdrop_core::testing::MockObjectStorage;
///
/// let storage = MockObjectStorage::new();
/// storage.fail_namespace("image").await;
///
/// // ... retire an order ...
///
/// let calls = storage.recorded_calls().await;
/// assert_eq!(calls[0].namespace.as_str(), "image");
/// assert_eq!(calls[1].namespace.as_str(), "raw");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockObjectStorage {
    calls: Arc<RwLock<Vec<RecordedDestroy>>>,
    failing_namespaces: Arc<RwLock<HashSet<String>>>,
    fail_all: Arc<RwLock<bool>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockObjectStorage {
    /// Create a new mock storage where every delete succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every delete against `namespace`.
    pub async fn fail_namespace(&self, namespace: &str) {
        self.failing_namespaces
            .write()
            .await
            .insert(namespace.to_string());
    }

    /// Fail every delete in every namespace.
    pub async fn fail_all(&self) {
        *self.fail_all.write().await = true;
    }

    /// Wait this long inside every call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// All destroy calls in the order they started.
    pub async fn recorded_calls(&self) -> Vec<RecordedDestroy> {
        self.calls.read().await.clone()
    }

    /// Number of destroy calls made.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Handles that were deleted successfully.
    pub async fn deleted_handles(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.success)
            .map(|c| c.handle.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn destroy(
        &self,
        handle: &str,
        namespace: &StorageNamespace,
    ) -> Result<(), StorageError> {
        let fail = *self.fail_all.read().await
            || self
                .failing_namespaces
                .read()
                .await
                .contains(namespace.as_str());

        self.calls.write().await.push(RecordedDestroy {
            handle: handle.to_string(),
            namespace: namespace.clone(),
            success: !fail,
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            Err(StorageError::Rejected {
                namespace: namespace.clone(),
                reason: "mock rejection".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
