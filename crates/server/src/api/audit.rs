use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use printdrop_core::{AuditFilter, AuditRecord};

use super::error::{api_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for audit queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    /// Filter by order ID
    pub order_id: Option<String>,
    /// Filter by event type
    pub event_type: Option<String>,
    /// Filter by user ID
    pub user_id: Option<String>,
    /// Filter events after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter events before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for audit query endpoint
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn build_filter(params: &AuditQueryParams) -> AuditFilter {
    let mut filter = AuditFilter::new();

    if let Some(ref order_id) = params.order_id {
        filter = filter.with_order_id(order_id);
    }
    if let Some(ref event_type) = params.event_type {
        filter = filter.with_event_type(event_type);
    }
    if let Some(ref user_id) = params.user_id {
        filter = filter.with_user_id(user_id);
    }
    if params.from.is_some() || params.to.is_some() {
        filter = filter.with_time_range(params.from, params.to);
    }
    filter
}

/// Query audit events
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    // Count uses the unpaginated filter
    let base_filter = build_filter(&params);
    let query_filter = base_filter.clone().with_limit(limit).with_offset(offset);

    let events = state.audit_store().query(&query_filter).map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to query audit events: {}", e),
        )
    })?;

    let total = state.audit_store().count(&base_filter).map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to count audit events: {}", e),
        )
    })?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AuditQueryParams {
        AuditQueryParams {
            order_id: None,
            event_type: None,
            user_id: None,
            from: None,
            to: None,
            limit: None,
            offset: None,
        }
    }

    #[test]
    fn test_build_filter_empty() {
        let filter = build_filter(&params());
        assert!(filter.order_id.is_none());
        assert!(filter.event_type.is_none());
        assert!(filter.from.is_none());
    }

    #[test]
    fn test_build_filter_sets_fields() {
        let filter = build_filter(&AuditQueryParams {
            order_id: Some("o1".to_string()),
            event_type: Some("order_retired".to_string()),
            user_id: Some("s1".to_string()),
            ..params()
        });
        assert_eq!(filter.order_id.as_deref(), Some("o1"));
        assert_eq!(filter.event_type.as_deref(), Some("order_retired"));
        assert_eq!(filter.user_id.as_deref(), Some("s1"));
    }
}
