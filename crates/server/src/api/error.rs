//! Error responses shared by the API handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;

use printdrop_core::{CleanupError, LifecycleError, OrderError, ShopError};

use crate::metrics::AUTHZ_DENIED_TOTAL;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Endpoint that retries the failed operation, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            retry: None,
        }),
    )
}

pub fn not_found(what: &str, id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("{} not found: {}", what, id))
}

/// Role or ownership check failed.
pub fn forbidden(operation: &str, message: impl Into<String>) -> ApiError {
    AUTHZ_DENIED_TOTAL.with_label_values(&[operation]).inc();
    api_error(StatusCode::FORBIDDEN, message)
}

pub fn order_error(e: OrderError) -> ApiError {
    let status = match &e {
        OrderError::Validation(_) | OrderError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        OrderError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderError::IllegalTransition { .. } | OrderError::FilesAlreadyAttached(_) => {
            StatusCode::CONFLICT
        }
        OrderError::Database(_) => {
            error!("Order store error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

pub fn cleanup_error(e: CleanupError) -> ApiError {
    error!(order_id = e.order_id(), "Order cleanup failed: {}", e);
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            retry: Some(format!("/api/v1/orders/{}/retire", e.order_id())),
            error: e.to_string(),
        }),
    )
}

pub fn lifecycle_error(e: LifecycleError) -> ApiError {
    match e {
        LifecycleError::Order(e) => order_error(e),
        LifecycleError::Cleanup(e) => cleanup_error(e),
        LifecycleError::NotTerminal { .. } => api_error(StatusCode::CONFLICT, e.to_string()),
    }
}

pub fn shop_error(e: ShopError) -> ApiError {
    match e {
        ShopError::NotFound(ref id) => not_found("Shop", id),
        ShopError::InvalidLocation(_) | ShopError::PriceOverflow { .. } => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        ShopError::Queue(e) => order_error(e),
    }
}
