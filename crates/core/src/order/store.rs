//! Order storage trait and types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use super::status::{Actor, InvalidStatus, OrderStatus, TransitionError};
use super::types::{FileRef, Order, StatusChange};

/// Error type for order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Missing or malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Status value outside the enumeration.
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    /// The state machine refused the change.
    #[error("Order {order_id}: {source}")]
    IllegalTransition {
        order_id: String,
        #[source]
        source: TransitionError,
    },

    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// Files can only be attached once.
    #[error("Files already attached to order {0}")]
    FilesAlreadyAttached(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub owner_id: String,
    pub shop_id: String,
    pub total_pages: u32,
    pub total_price: Decimal,
}

impl CreateOrderRequest {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.owner_id.trim().is_empty() {
            return Err(OrderError::Validation("owner_id is required".to_string()));
        }
        if self.shop_id.trim().is_empty() {
            return Err(OrderError::Validation("shop_id is required".to_string()));
        }
        if self.total_price.is_sign_negative() && !self.total_price.is_zero() {
            return Err(OrderError::Validation(
                "total_price cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Filter for querying orders. Fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub owner_id: Option<String>,
    pub shop_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl OrderFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_shop(mut self, shop_id: impl Into<String>) -> Self {
        self.shop_id = Some(shop_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Whether a write to an order with these keys can change the result set.
    ///
    /// Status is ignored: a status change moves orders in and out of
    /// status-filtered results.
    pub fn may_contain(&self, owner_id: &str, shop_id: &str) -> bool {
        self.owner_id.as_deref().is_none_or(|o| o == owner_id)
            && self.shop_id.as_deref().is_none_or(|s| s == shop_id)
    }
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

/// Notification published after every committed write.
///
/// Carries only the keys needed for routing; watchers re-read the
/// current snapshot themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderChange {
    pub order_id: String,
    pub owner_id: String,
    pub shop_id: String,
    pub kind: ChangeKind,
}

impl OrderChange {
    pub(crate) fn of(order: &Order, kind: ChangeKind) -> Self {
        Self {
            order_id: order.id.clone(),
            owner_id: order.owner_id.clone(),
            shop_id: order.shop_id.clone(),
            kind,
        }
    }
}

/// Trait for order storage backends.
pub trait OrderStore: Send + Sync {
    /// Create a new order in `pending` with no files.
    fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError>;

    /// Get an order by ID.
    fn get(&self, id: &str) -> Result<Option<Order>, OrderError>;

    /// List orders matching the filter, newest first.
    fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError>;

    /// Count orders matching the filter.
    fn count(&self, filter: &OrderFilter) -> Result<i64, OrderError>;

    /// Write the full file list. Rejected if files are already present.
    fn attach_files(&self, id: &str, files: Vec<FileRef>) -> Result<Order, OrderError>;

    /// Apply a status transition and stamp `updated_at`.
    fn update_status(
        &self,
        id: &str,
        new_status: OrderStatus,
        actor: Actor,
    ) -> Result<StatusChange, OrderError>;

    /// Permanently delete an order, returning it.
    fn delete(&self, id: &str) -> Result<Order, OrderError>;

    /// Receive a notification for every committed write, in commit order.
    fn subscribe(&self) -> broadcast::Receiver<OrderChange>;

    /// Orders placed by a customer, newest first.
    fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Order>, OrderError> {
        self.list(&OrderFilter::new().with_owner(owner_id).with_limit(i64::MAX))
    }

    /// Orders addressed to a shop, newest first.
    fn list_for_shop(&self, shop_id: &str) -> Result<Vec<Order>, OrderError> {
        self.list(&OrderFilter::new().with_shop(shop_id).with_limit(i64::MAX))
    }
}
