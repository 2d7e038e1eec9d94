//! Order lifecycle operations.
//!
//! `OrderService` is the single entry point the server uses for writes. It
//! parses untyped status input, runs transitions through the store, and
//! retires an order as soon as it reaches a terminal status.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::cleanup::{CleanupCoordinator, CleanupError, CleanupOutcome};
use crate::metrics::{ORDERS_CREATED, STATUS_TRANSITIONS, TRANSITIONS_REJECTED};
use crate::order::{
    Actor, CreateOrderRequest, FileRef, Order, OrderError, OrderFilter, OrderStatus, OrderStore,
    StatusChange,
};

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The status was committed but retiring the order failed.
    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error("Order {order_id} is {status}, only terminal orders can be retired")]
    NotTerminal {
        order_id: String,
        status: OrderStatus,
    },
}

/// A committed status change and, for terminal statuses, the retirement result.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    #[serde(flatten)]
    pub change: StatusChange,
    pub retirement: Option<CleanupOutcome>,
}

/// Per-status order counts for one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopOrderSummary {
    pub shop_id: String,
    pub counts: BTreeMap<String, i64>,
    pub active: i64,
}

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cleanup: Arc<CleanupCoordinator>,
    audit: Option<AuditHandle>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, cleanup: Arc<CleanupCoordinator>) -> Self {
        Self {
            store,
            cleanup,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    pub fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let order = self.store.create(request)?;
        ORDERS_CREATED.inc();
        info!(order_id = %order.id, owner_id = %order.owner_id, shop_id = %order.shop_id, "Order created");

        self.emit(AuditEvent::OrderCreated {
            order_id: order.id.clone(),
            owner_id: order.owner_id.clone(),
            shop_id: order.shop_id.clone(),
            total_pages: order.total_pages,
            total_price: order.total_price,
        });
        Ok(order)
    }

    pub fn attach_files(&self, order_id: &str, files: Vec<FileRef>) -> Result<Order, OrderError> {
        let order = self.store.attach_files(order_id, files)?;
        info!(order_id, files = order.files.len(), "Files attached");

        self.emit(AuditEvent::FilesAttached {
            order_id: order.id.clone(),
            owner_id: order.owner_id.clone(),
            file_count: order.files.len(),
            handles: order.files.iter().map(|f| f.handle.clone()).collect(),
        });
        Ok(order)
    }

    pub async fn update_status(
        &self,
        order_id: &str,
        requested: &str,
        actor: Actor,
    ) -> Result<StatusUpdate, LifecycleError> {
        self.update_status_by(order_id, requested, actor, None).await
    }

    /// Apply a status change requested by `changed_by`.
    ///
    /// A terminal status is committed before the order is retired, and the
    /// retirement finishes before this returns. Retirement runs on its own
    /// task, so it completes even if this future is dropped.
    pub async fn update_status_by(
        &self,
        order_id: &str,
        requested: &str,
        actor: Actor,
        changed_by: Option<&str>,
    ) -> Result<StatusUpdate, LifecycleError> {
        let target: OrderStatus = requested.parse().map_err(OrderError::from)?;

        let change = match self.store.update_status(order_id, target, actor) {
            Ok(change) => change,
            Err(e) => {
                if let OrderError::IllegalTransition { ref source, .. } = e {
                    TRANSITIONS_REJECTED.inc();
                    warn!(order_id, actor = %actor, error = %source, "Status change refused");
                }
                return Err(e.into());
            }
        };

        STATUS_TRANSITIONS
            .with_label_values(&[change.previous.as_str(), change.order.status.as_str()])
            .inc();
        info!(
            order_id,
            from = %change.previous,
            to = %change.order.status,
            actor = %actor,
            "Order status changed"
        );
        self.emit(AuditEvent::OrderStatusChanged {
            order_id: change.order.id.clone(),
            actor,
            changed_by: changed_by.map(String::from),
            from_status: change.previous,
            to_status: change.order.status,
        });

        let retirement = if change.order.status.is_terminal() {
            Some(self.cleanup.retire_detached(order_id).await?)
        } else {
            None
        };

        Ok(StatusUpdate { change, retirement })
    }

    /// Retry cleanup of a terminal order. A missing order is already gone.
    pub async fn retire(&self, order_id: &str) -> Result<CleanupOutcome, LifecycleError> {
        if let Some(order) = self.store.get(order_id)? {
            if !order.status.is_terminal() {
                return Err(LifecycleError::NotTerminal {
                    order_id: order.id,
                    status: order.status,
                });
            }
        }
        Ok(self.cleanup.retire_detached(order_id).await?)
    }

    pub fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
        self.store.get(order_id)
    }

    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Order>, OrderError> {
        self.store.list_for_owner(owner_id)
    }

    pub fn list_for_shop(&self, shop_id: &str) -> Result<Vec<Order>, OrderError> {
        self.store.list_for_shop(shop_id)
    }

    pub fn shop_summary(&self, shop_id: &str) -> Result<ShopOrderSummary, OrderError> {
        let mut counts = BTreeMap::new();
        let mut active = 0;
        for status in OrderStatus::ALL {
            let n = self
                .store
                .count(&OrderFilter::new().with_shop(shop_id).with_status(status))?;
            if status.is_active() {
                active += n;
            }
            counts.insert(status.as_str().to_string(), n);
        }
        Ok(ShopOrderSummary {
            shop_id: shop_id.to_string(),
            counts,
            active,
        })
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }
}
