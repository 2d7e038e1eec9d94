//! Shop API handlers: ranking, dashboard summary and availability.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use printdrop_core::{GeoPoint, RankedShop, Role, Shop, ShopOrderSummary};

use super::error::{order_error, shop_error, ApiError};
use super::middleware::Caller;
use crate::state::AppState;

/// Query parameters for shop ranking
#[derive(Debug, Deserialize)]
pub struct RankParams {
    pub lat: f64,
    pub lng: f64,
    pub pages: u32,
}

#[derive(Debug, Serialize)]
pub struct RankResponse {
    pub shops: Vec<RankedShop>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityBody {
    pub available: bool,
}

/// Rank available shops for a location and page count
pub async fn rank_shops(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RankParams>,
) -> Result<Json<RankResponse>, ApiError> {
    let location = GeoPoint::new(params.lat, params.lng).map_err(shop_error)?;
    let shops = state
        .directory()
        .rank(location, params.pages)
        .await
        .map_err(shop_error)?;
    Ok(Json(RankResponse { shops }))
}

/// Per-status order counts for the calling shop
pub async fn my_summary(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<ShopOrderSummary>, ApiError> {
    caller.require(Role::Shop, "shop_summary")?;
    let summary = state
        .orders()
        .shop_summary(caller.id())
        .map_err(order_error)?;
    Ok(Json(summary))
}

/// Open or close the calling shop
pub async fn set_my_availability(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(body): Json<AvailabilityBody>,
) -> Result<Json<Shop>, ApiError> {
    caller.require(Role::Shop, "set_availability")?;
    let shop = state
        .directory()
        .set_availability(caller.id(), body.available)
        .await
        .map_err(shop_error)?;
    Ok(Json(shop))
}
