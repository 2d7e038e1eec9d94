use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::metrics::{BLOBS_ORPHANED, BLOB_DELETIONS, CLEANUPS, CLEANUP_DURATION};
use crate::order::{FileRef, OrderError, OrderStore};
use crate::storage::ObjectStorage;

use super::{
    BlobAttempt, BlobOutcome, CleanupError, CleanupOutcome, CleanupReport, DeletionPlan,
    FileCleanup,
};

/// Retires terminal orders.
pub struct CleanupCoordinator {
    store: Arc<dyn OrderStore>,
    storage: Option<Arc<dyn ObjectStorage>>,
    plan: DeletionPlan,
    audit: Option<AuditHandle>,
}

impl CleanupCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        storage: Arc<dyn ObjectStorage>,
        plan: DeletionPlan,
    ) -> Self {
        Self {
            store,
            storage: Some(storage),
            plan,
            audit: None,
        }
    }

    /// A coordinator that only deletes records; every file is skipped.
    pub fn records_only(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            storage: None,
            plan: DeletionPlan::new(Vec::new()),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn plan(&self) -> &DeletionPlan {
        &self.plan
    }

    /// Run [`retire`](Self::retire) on its own task.
    ///
    /// Dropping the returned future does not stop the cleanup: once started it
    /// runs to completion, so a disconnected caller cannot leave a terminal
    /// record behind with only some of its blobs deleted.
    pub async fn retire_detached(
        self: &Arc<Self>,
        order_id: &str,
    ) -> Result<CleanupOutcome, CleanupError> {
        let coordinator = Arc::clone(self);
        let id = order_id.to_string();
        let task = tokio::spawn(async move { coordinator.retire(&id).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(order_id, error = %e, "Cleanup task did not finish");
                Err(CleanupError::Aborted {
                    order_id: order_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Delete every blob of the order, then the order itself.
    ///
    /// Idempotent: a missing order is `AlreadyGone`. Blob failures never
    /// abort the run.
    pub async fn retire(&self, order_id: &str) -> Result<CleanupOutcome, CleanupError> {
        let started = Instant::now();

        let order = match self.store.get(order_id) {
            Ok(Some(order)) => order,
            Ok(None) => {
                debug!(order_id, "Order already gone, nothing to clean up");
                self.finish("already_gone", started);
                return Ok(CleanupOutcome::AlreadyGone);
            }
            Err(source) => {
                error!(order_id, error = %source, "Failed to read order for cleanup");
                self.finish("failed", started);
                return Err(CleanupError::Lookup {
                    order_id: order_id.to_string(),
                    source,
                });
            }
        };

        info!(order_id, files = order.files.len(), "Retiring order");

        let files = join_all(
            order
                .files
                .iter()
                .map(|file| self.delete_blob(&order.id, file)),
        )
        .await;
        let report = CleanupReport {
            order_id: order.id.clone(),
            files,
        };

        match self.store.delete(&order.id) {
            // A concurrent retire got there first.
            Ok(_) | Err(OrderError::NotFound(_)) => {}
            Err(e) => {
                error!(order_id, error = %e, "Failed to delete order record after blob cleanup");
                self.emit(AuditEvent::OrderCleanupFailed {
                    order_id: order.id.clone(),
                    error: e.to_string(),
                })
                .await;
                self.finish("failed", started);
                return Err(CleanupError::RecordDelete {
                    order_id: order.id,
                    reason: e.to_string(),
                    report,
                });
            }
        }

        info!(
            order_id,
            deleted = report.deleted(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Order retired"
        );
        self.emit(AuditEvent::OrderRetired {
            order_id: order.id.clone(),
            files_deleted: report.deleted(),
            files_failed: report.failed(),
            files_skipped: report.skipped(),
        })
        .await;
        self.finish("retired", started);

        Ok(CleanupOutcome::Retired(report))
    }

    /// Walk the plan until one namespace accepts the delete.
    async fn delete_blob(&self, order_id: &str, file: &FileRef) -> FileCleanup {
        let outcome = match &self.storage {
            Some(storage) if !file.handle.trim().is_empty() && !self.plan.namespaces().is_empty() => {
                self.probe_namespaces(storage.as_ref(), order_id, &file.handle)
                    .await
            }
            _ => {
                debug!(order_id, file = %file.name, "Skipping blob deletion");
                BlobOutcome::Skipped
            }
        };

        FileCleanup {
            name: file.name.clone(),
            handle: file.handle.clone(),
            outcome,
        }
    }

    async fn probe_namespaces(
        &self,
        storage: &dyn ObjectStorage,
        order_id: &str,
        handle: &str,
    ) -> BlobOutcome {
        let mut attempts = Vec::new();

        for namespace in self.plan.namespaces() {
            match storage.destroy(handle, namespace).await {
                Ok(()) => {
                    BLOB_DELETIONS
                        .with_label_values(&[namespace.as_str(), "deleted"])
                        .inc();
                    debug!(order_id, handle, namespace = %namespace, "Blob deleted");
                    return BlobOutcome::Deleted {
                        namespace: namespace.clone(),
                    };
                }
                Err(e) => {
                    BLOB_DELETIONS
                        .with_label_values(&[namespace.as_str(), e.kind()])
                        .inc();
                    debug!(order_id, handle, namespace = %namespace, error = %e, "Delete refused, probing next namespace");
                    attempts.push(BlobAttempt {
                        namespace: namespace.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let last_error = attempts
            .last()
            .map(|a| a.error.clone())
            .unwrap_or_default();
        warn!(
            order_id,
            handle,
            backend = storage.name(),
            error = %last_error,
            "Blob could not be deleted from any namespace"
        );
        BLOBS_ORPHANED.inc();
        self.emit(AuditEvent::BlobDeleteFailed {
            order_id: order_id.to_string(),
            handle: handle.to_string(),
            namespaces_tried: attempts
                .iter()
                .map(|a| a.namespace.to_string())
                .collect(),
            error: last_error,
        })
        .await;

        BlobOutcome::Failed { attempts }
    }

    async fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.emit(event).await;
        }
    }

    fn finish(&self, outcome: &str, started: Instant) {
        CLEANUPS.with_label_values(&[outcome]).inc();
        CLEANUP_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEventEnvelope;
    use crate::order::{
        Actor, CreateOrderRequest, Order, OrderChange, OrderFilter, OrderStatus, SqliteOrderStore,
        StatusChange,
    };
    use crate::storage::StorageNamespace;
    use crate::testing::MockObjectStorage;
    use rust_decimal::Decimal;
    use std::time::Duration;
    use tokio::sync::{broadcast, mpsc};

    fn files(n: usize) -> Vec<FileRef> {
        (0..n)
            .map(|i| {
                FileRef::new(
                    format!("file-{}.pdf", i),
                    format!("https://cdn.test/{}", i),
                    format!("orders/{}", i),
                    1,
                )
            })
            .collect()
    }

    fn completed_order(store: &SqliteOrderStore, file_count: usize) -> Order {
        let order = store
            .create(CreateOrderRequest {
                owner_id: "u1".to_string(),
                shop_id: "s1".to_string(),
                total_pages: file_count as u32,
                total_price: Decimal::new(5, 0),
            })
            .unwrap();
        if file_count > 0 {
            store.attach_files(&order.id, files(file_count)).unwrap();
        }
        for status in [OrderStatus::Printing, OrderStatus::Ready, OrderStatus::Completed] {
            store.update_status(&order.id, status, Actor::Shop).unwrap();
        }
        store.get(&order.id).unwrap().unwrap()
    }

    fn setup() -> (Arc<SqliteOrderStore>, MockObjectStorage, CleanupCoordinator) {
        let store = Arc::new(SqliteOrderStore::in_memory().unwrap());
        let storage = MockObjectStorage::new();
        let coordinator = CleanupCoordinator::new(
            store.clone(),
            Arc::new(storage.clone()),
            DeletionPlan::default(),
        );
        (store, storage, coordinator)
    }

    #[tokio::test]
    async fn test_missing_order_is_already_gone() {
        let (_store, storage, coordinator) = setup();

        let outcome = coordinator.retire("nonexistent").await.unwrap();

        assert_eq!(outcome, CleanupOutcome::AlreadyGone);
        assert!(!outcome.existed());
        assert_eq!(storage.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_detached_retire_survives_dropped_caller() {
        let (store, storage, coordinator) = setup();
        let coordinator = Arc::new(coordinator);
        storage.set_delay(Duration::from_millis(150)).await;
        let order = completed_order(&store, 3);

        let gave_up =
            tokio::time::timeout(Duration::from_millis(20), coordinator.retire_detached(&order.id))
                .await;
        assert!(gave_up.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(store.get(&order.id).unwrap().is_none());
        assert_eq!(storage.deleted_handles().await.len(), 3);

        let again = coordinator.retire_detached(&order.id).await.unwrap();
        assert_eq!(again, CleanupOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn test_retire_deletes_blobs_then_record() {
        let (store, storage, coordinator) = setup();
        let order = completed_order(&store, 2);

        let outcome = coordinator.retire(&order.id).await.unwrap();

        let CleanupOutcome::Retired(report) = outcome else {
            panic!("expected Retired");
        };
        assert_eq!(report.deleted(), 2);
        assert!(store.get(&order.id).unwrap().is_none());

        let mut deleted = storage.deleted_handles().await;
        deleted.sort();
        assert_eq!(deleted, vec!["orders/0", "orders/1"]);
        assert!(storage
            .recorded_calls()
            .await
            .iter()
            .all(|c| c.namespace == StorageNamespace::image()));
    }

    #[tokio::test]
    async fn test_retire_twice_is_idempotent() {
        let (store, _storage, coordinator) = setup();
        let order = completed_order(&store, 1);

        assert!(coordinator.retire(&order.id).await.unwrap().existed());
        assert_eq!(
            coordinator.retire(&order.id).await.unwrap(),
            CleanupOutcome::AlreadyGone
        );
    }

    #[tokio::test]
    async fn test_rejected_namespace_probes_next() {
        let (store, storage, coordinator) = setup();
        storage.fail_namespace("image").await;
        let order = completed_order(&store, 1);

        let CleanupOutcome::Retired(report) = coordinator.retire(&order.id).await.unwrap() else {
            panic!("expected Retired");
        };

        assert_eq!(
            report.files[0].outcome,
            BlobOutcome::Deleted {
                namespace: StorageNamespace::raw()
            }
        );
        let calls = storage.recorded_calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].namespace, StorageNamespace::image());
        assert!(!calls[0].success);
        assert_eq!(calls[1].namespace, StorageNamespace::raw());
        assert!(calls[1].success);
    }

    #[tokio::test]
    async fn test_all_blob_failures_still_delete_record() {
        let (store, storage, coordinator) = setup();
        storage.fail_all().await;
        let order = completed_order(&store, 3);

        let CleanupOutcome::Retired(report) = coordinator.retire(&order.id).await.unwrap() else {
            panic!("expected Retired");
        };

        assert_eq!(report.failed(), 3);
        for file in &report.files {
            match &file.outcome {
                BlobOutcome::Failed { attempts } => assert_eq!(attempts.len(), 2),
                other => panic!("expected Failed, got {:?}", other),
            }
        }
        assert_eq!(storage.call_count().await, 6);
        assert!(store.get(&order.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_order_without_files() {
        let (store, storage, coordinator) = setup();
        let order = completed_order(&store, 0);

        let CleanupOutcome::Retired(report) = coordinator.retire(&order.id).await.unwrap() else {
            panic!("expected Retired");
        };
        assert!(report.files.is_empty());
        assert_eq!(storage.call_count().await, 0);
        assert!(store.get(&order.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_handle_is_skipped() {
        let (store, storage, coordinator) = setup();
        let order = store
            .create(CreateOrderRequest {
                owner_id: "u1".to_string(),
                shop_id: "s1".to_string(),
                total_pages: 1,
                total_price: Decimal::ONE,
            })
            .unwrap();
        store
            .attach_files(&order.id, vec![FileRef::new("legacy.pdf", "https://cdn.test/x", "", 1)])
            .unwrap();

        let CleanupOutcome::Retired(report) = coordinator.retire(&order.id).await.unwrap() else {
            panic!("expected Retired");
        };
        assert_eq!(report.skipped(), 1);
        assert_eq!(storage.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_records_only_skips_storage() {
        let store = Arc::new(SqliteOrderStore::in_memory().unwrap());
        let coordinator = CleanupCoordinator::records_only(store.clone());
        let order = completed_order(&store, 2);

        let CleanupOutcome::Retired(report) = coordinator.retire(&order.id).await.unwrap() else {
            panic!("expected Retired");
        };
        assert_eq!(report.skipped(), 2);
        assert!(store.get(&order.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blob_deletions_run_concurrently() {
        let (store, storage, coordinator) = setup();
        storage.set_delay(Duration::from_millis(100)).await;
        let order = completed_order(&store, 4);

        let started = Instant::now();
        coordinator.retire(&order.id).await.unwrap();

        assert!(
            started.elapsed() < Duration::from_millis(350),
            "deletes ran sequentially: {:?}",
            started.elapsed()
        );
        assert_eq!(storage.call_count().await, 4);
    }

    #[tokio::test]
    async fn test_failures_are_audited() {
        let (store, storage, coordinator) = setup();
        storage.fail_all().await;
        let (tx, mut rx) = mpsc::channel::<AuditEventEnvelope>(16);
        let coordinator = coordinator.with_audit(AuditHandle::new(tx));
        let order = completed_order(&store, 1);

        coordinator.retire(&order.id).await.unwrap();
        drop(coordinator);

        let mut events = Vec::new();
        while let Some(envelope) = rx.recv().await {
            events.push(envelope.event);
        }
        assert!(matches!(
            &events[0],
            AuditEvent::BlobDeleteFailed { namespaces_tried, .. } if namespaces_tried == &["image", "raw"]
        ));
        assert!(matches!(
            &events[1],
            AuditEvent::OrderRetired { files_failed: 1, .. }
        ));
    }

    /// Store whose deletes always fail.
    struct UndeletableStore(SqliteOrderStore);

    impl OrderStore for UndeletableStore {
        fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
            self.0.create(request)
        }
        fn get(&self, id: &str) -> Result<Option<Order>, OrderError> {
            self.0.get(id)
        }
        fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
            self.0.list(filter)
        }
        fn count(&self, filter: &OrderFilter) -> Result<i64, OrderError> {
            self.0.count(filter)
        }
        fn attach_files(&self, id: &str, files: Vec<FileRef>) -> Result<Order, OrderError> {
            self.0.attach_files(id, files)
        }
        fn update_status(
            &self,
            id: &str,
            new_status: OrderStatus,
            actor: Actor,
        ) -> Result<StatusChange, OrderError> {
            self.0.update_status(id, new_status, actor)
        }
        fn delete(&self, _id: &str) -> Result<Order, OrderError> {
            Err(OrderError::Database("disk I/O error".to_string()))
        }
        fn subscribe(&self) -> broadcast::Receiver<OrderChange> {
            self.0.subscribe()
        }
    }

    #[tokio::test]
    async fn test_record_delete_failure_is_reported() {
        let inner = SqliteOrderStore::in_memory().unwrap();
        let order = completed_order(&inner, 2);
        let store = Arc::new(UndeletableStore(inner));
        let storage = MockObjectStorage::new();
        let coordinator = CleanupCoordinator::new(
            store.clone(),
            Arc::new(storage.clone()),
            DeletionPlan::default(),
        );

        let err = coordinator.retire(&order.id).await.unwrap_err();

        match err {
            CleanupError::RecordDelete {
                order_id, report, ..
            } => {
                assert_eq!(order_id, order.id);
                assert_eq!(report.deleted(), 2);
            }
            other => panic!("expected RecordDelete, got {:?}", other),
        }
        // Blobs went first; the terminal record stays for a retry.
        assert_eq!(storage.deleted_handles().await.len(), 2);
        assert!(store.get(&order.id).unwrap().is_some());
    }
}
