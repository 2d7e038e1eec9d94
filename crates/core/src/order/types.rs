//! Core order data types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::status::OrderStatus;

/// Metadata for one uploaded file attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    /// Original file name.
    pub name: String,
    /// Public URL of the stored object.
    pub url: String,
    /// Opaque object-storage handle, distinct from the URL.
    pub handle: String,
    /// Content type reported at upload time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Pages counted in this file.
    pub pages: u32,
}

impl FileRef {
    /// Create a file reference without a content type.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        handle: impl Into<String>,
        pages: u32,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            handle: handle.into(),
            content_type: None,
            pages,
        }
    }

    /// Set the content type hint.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A customer print job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub owner_id: String,
    pub shop_id: String,
    pub status: OrderStatus,
    pub total_pages: u32,
    pub total_price: Decimal,
    pub files: Vec<FileRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether files have already been attached.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Result of a committed status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub previous: OrderStatus,
    pub order: Order,
}
