//! Object storage for uploaded print files.
//!
//! Only deletion is needed here: uploads happen client-side and the order
//! keeps the returned handle. A handle does not say which namespace holds
//! the object, so callers probe namespaces in order (see `cleanup`).

mod cloudinary;
mod signing;

pub use cloudinary::CloudinaryStorage;
pub use signing::{RequestSigner, SignedDestroyParams};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A storage namespace (resource class), e.g. `image` or `raw`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageNamespace(String);

impl StorageNamespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn image() -> Self {
        Self::new("image")
    }

    pub fn raw() -> Self {
        Self::new("raw")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorageNamespace {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Errors from object storage.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The namespace refused the request (non-success HTTP status).
    #[error("{namespace} rejected delete: {reason}")]
    Rejected {
        namespace: StorageNamespace,
        reason: String,
    },

    /// The namespace does not hold the handle.
    #[error("not found in {namespace}")]
    NotFound { namespace: StorageNamespace },

    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::Rejected { .. } => "rejected",
            StorageError::NotFound { .. } => "not_found",
            StorageError::Timeout => "timeout",
            StorageError::ConnectionFailed(_) => "connection_failed",
            StorageError::Api(_) => "api_error",
            StorageError::Configuration(_) => "configuration",
        }
    }
}

/// Trait for object storage backends.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Delete `handle` from `namespace`.
    async fn destroy(&self, handle: &str, namespace: &StorageNamespace)
        -> Result<(), StorageError>;
}
