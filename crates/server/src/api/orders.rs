//! Order API handlers.
//!
//! Customers create orders and attach files; the order's shop drives its
//! status. Each handler checks the caller's role and ownership before
//! touching the core.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use printdrop_core::{
    CleanupOutcome, CreateOrderRequest, FileRef, Order, OrderStatus, Role, StatusUpdate,
};

use super::error::{forbidden, lifecycle_error, not_found, order_error, ApiError};
use super::middleware::Caller;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub shop_id: String,
    pub total_pages: u32,
    pub total_price: Decimal,
}

/// Request body for attaching files
#[derive(Debug, Deserialize)]
pub struct AttachFilesBody {
    pub files: Vec<FileRef>,
}

/// Request body for a status change
///
/// The status stays a plain string here so unknown values reach the
/// core's parser and come back as a validation error.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

/// Order plus the status changes the caller may request.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub allowed_transitions: Vec<OrderStatus>,
}

impl OrderResponse {
    fn for_caller(order: Order, caller: &Caller) -> Self {
        let allowed_transitions = order.status.allowed_targets(caller.role().actor());
        Self {
            order,
            allowed_transitions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<OrderResponse>,
    pub total: usize,
}

// ============================================================================
// Access checks
// ============================================================================

/// Whether the caller is a party to the order.
fn is_party(caller: &Caller, order: &Order) -> bool {
    match caller.role() {
        Role::Customer => order.owner_id == caller.id(),
        Role::Shop => order.shop_id == caller.id(),
    }
}

/// Load an order the caller may see.
pub(crate) fn load_visible(
    state: &AppState,
    caller: &Caller,
    id: &str,
    operation: &str,
) -> Result<Order, ApiError> {
    let order = state
        .orders()
        .get_order(id)
        .map_err(order_error)?
        .ok_or_else(|| not_found("Order", id))?;

    if !is_party(caller, &order) {
        return Err(forbidden(
            operation,
            format!("Order {} belongs to another party", id),
        ));
    }
    Ok(order)
}

/// Load an order and require the caller to be its shop.
fn load_for_shop(
    state: &AppState,
    caller: &Caller,
    id: &str,
    operation: &str,
) -> Result<Order, ApiError> {
    caller.require(Role::Shop, operation)?;
    load_visible(state, caller, id, operation)
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new order for the calling customer
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    caller.require(Role::Customer, "create_order")?;

    let request = CreateOrderRequest {
        owner_id: caller.id().to_string(),
        shop_id: body.shop_id,
        total_pages: body.total_pages,
        total_price: body.total_price,
    };

    let order = state.orders().create_order(request).map_err(order_error)?;
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::for_caller(order, &caller)),
    ))
}

/// List the caller's orders: placed by a customer, or addressed to a shop
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    let orders = match caller.role() {
        Role::Customer => state.orders().list_for_owner(caller.id()),
        Role::Shop => state.orders().list_for_shop(caller.id()),
    }
    .map_err(order_error)?;

    let orders: Vec<_> = orders
        .into_iter()
        .map(|o| OrderResponse::for_caller(o, &caller))
        .collect();
    Ok(Json(ListOrdersResponse {
        total: orders.len(),
        orders,
    }))
}

/// Get one order, visible to its owner and its shop
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = load_visible(&state, &caller, &id, "get_order")?;
    Ok(Json(OrderResponse::for_caller(order, &caller)))
}

/// Attach the uploaded files' metadata; owner only, once
pub async fn attach_files(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<AttachFilesBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    caller.require(Role::Customer, "attach_files")?;
    load_visible(&state, &caller, &id, "attach_files")?;

    let order = state
        .orders()
        .attach_files(&id, body.files)
        .map_err(order_error)?;
    Ok(Json(OrderResponse::for_caller(order, &caller)))
}

/// Change the status; the order's shop only
///
/// Terminal statuses retire the order before the response is sent.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<StatusUpdate>, ApiError> {
    load_for_shop(&state, &caller, &id, "update_status")?;

    let update = state
        .orders()
        .update_status_by(&id, &body.status, caller.role().actor(), Some(caller.id()))
        .await
        .map_err(lifecycle_error)?;
    Ok(Json(update))
}

/// Retry cleanup of a terminal order; the order's shop only
///
/// An order that is already gone reports `already_gone`.
pub async fn retire_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CleanupOutcome>, ApiError> {
    caller.require(Role::Shop, "retire_order")?;
    match load_visible(&state, &caller, &id, "retire_order") {
        Ok(_) => {}
        Err((status, _)) if status == StatusCode::NOT_FOUND => {
            return Ok(Json(CleanupOutcome::AlreadyGone))
        }
        Err(e) => return Err(e),
    }

    let outcome = state.orders().retire(&id).await.map_err(lifecycle_error)?;
    Ok(Json(outcome))
}
