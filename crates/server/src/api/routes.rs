use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, handlers, orders, shops, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Routes that need no identity
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        .route("/shops/rank", get(shops::rank_shops));

    let protected_routes = Router::new()
        // Orders
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/files", post(orders::attach_files))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/orders/{id}/retire", post(orders::retire_order))
        .route("/orders/{id}/watch", get(ws::watch_order))
        // Shop dashboard
        .route("/shops/me/orders/watch", get(ws::watch_shop_orders))
        .route("/shops/me/summary", get(shops::my_summary))
        .route("/shops/me/availability", put(shops::set_my_availability))
        // Audit
        .route("/audit", get(audit::query_audit))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = public_routes.merge(protected_routes).with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
