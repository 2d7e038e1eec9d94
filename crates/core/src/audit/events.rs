use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{Actor, OrderStatus};

/// Audit event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Order lifecycle
    OrderCreated {
        order_id: String,
        owner_id: String,
        shop_id: String,
        total_pages: u32,
        total_price: Decimal,
    },
    FilesAttached {
        order_id: String,
        owner_id: String,
        file_count: usize,
        handles: Vec<String>,
    },
    OrderStatusChanged {
        order_id: String,
        actor: Actor,
        /// Subject that requested the change, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        changed_by: Option<String>,
        from_status: OrderStatus,
        to_status: OrderStatus,
    },

    // Cleanup
    /// Every namespace refused the delete; the blob is orphaned.
    BlobDeleteFailed {
        order_id: String,
        handle: String,
        namespaces_tried: Vec<String>,
        error: String,
    },
    OrderRetired {
        order_id: String,
        files_deleted: usize,
        files_failed: usize,
        files_skipped: usize,
    },
    /// The record delete failed; the terminal order remains for manual retry.
    OrderCleanupFailed {
        order_id: String,
        error: String,
    },

    // Shops
    ShopAvailabilityChanged {
        shop_id: String,
        available: bool,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage/filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::ServiceStarted { .. } => "service_started",
            AuditEvent::ServiceStopped { .. } => "service_stopped",
            AuditEvent::OrderCreated { .. } => "order_created",
            AuditEvent::FilesAttached { .. } => "files_attached",
            AuditEvent::OrderStatusChanged { .. } => "order_status_changed",
            AuditEvent::BlobDeleteFailed { .. } => "blob_delete_failed",
            AuditEvent::OrderRetired { .. } => "order_retired",
            AuditEvent::OrderCleanupFailed { .. } => "order_cleanup_failed",
            AuditEvent::ShopAvailabilityChanged { .. } => "shop_availability_changed",
        }
    }

    /// Returns the order ID if this event is order-related
    pub fn order_id(&self) -> Option<&str> {
        match self {
            AuditEvent::OrderCreated { order_id, .. }
            | AuditEvent::FilesAttached { order_id, .. }
            | AuditEvent::OrderStatusChanged { order_id, .. }
            | AuditEvent::BlobDeleteFailed { order_id, .. }
            | AuditEvent::OrderRetired { order_id, .. }
            | AuditEvent::OrderCleanupFailed { order_id, .. } => Some(order_id),
            AuditEvent::ServiceStarted { .. }
            | AuditEvent::ServiceStopped { .. }
            | AuditEvent::ShopAvailabilityChanged { .. } => None,
        }
    }

    /// Returns the acting subject if this event has one
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuditEvent::OrderCreated { owner_id, .. }
            | AuditEvent::FilesAttached { owner_id, .. } => Some(owner_id),
            AuditEvent::OrderStatusChanged { changed_by, .. } => changed_by.as_deref(),
            AuditEvent::ShopAvailabilityChanged { shop_id, .. } => Some(shop_id),
            _ => None,
        }
    }
}

/// Stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}
