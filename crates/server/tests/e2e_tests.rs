//! End-to-end tests over the full router.
//!
//! These run the server stack in-process with trusted-header auth and a
//! mock object storage behind order retirement.

#[macro_use]
mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{As, TestFixture};

fn files_body() -> serde_json::Value {
    json!({
        "files": [
            {
                "name": "thesis.pdf",
                "url": "https://res.cloudinary.test/printdrop/thesis.pdf",
                "handle": "printdrop/thesis",
                "content_type": "application/pdf",
                "pages": 8
            },
            {
                "name": "cover.png",
                "url": "https://res.cloudinary.test/printdrop/cover.png",
                "handle": "printdrop/cover",
                "pages": 1
            }
        ]
    })
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get(As::Anonymous, "/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;
    let response = fixture.get(As::Anonymous, "/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["auth"]["method"], "trusted_headers");
    assert!(response.body["storage"].get("api_secret").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint_is_prometheus_text() {
    let fixture = TestFixture::new().await;
    fixture.create_order("alice", "shop-a").await;

    let response = fixture.get(As::Anonymous, "/api/v1/metrics").await;
    assert_status!(response, StatusCode::OK);
    let text = response.body.as_str().expect("text body");
    assert!(text.contains("printdrop_orders_created_total"));
}

#[tokio::test]
async fn test_protected_routes_require_identity() {
    let fixture = TestFixture::new().await;
    let response = fixture.get(As::Anonymous, "/api/v1/orders").await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Order lifecycle
// =============================================================================

#[tokio::test]
async fn test_create_order() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            As::Customer("alice"),
            "/api/v1/orders",
            json!({ "shop_id": "shop-a", "total_pages": 12, "total_price": "3.60" }),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert!(response.body["id"].is_string());
    assert_eq!(response.body["owner_id"], "alice");
    assert_eq!(response.body["shop_id"], "shop-a");
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["total_pages"], 12);
    // Customers never drive status
    assert_eq!(response.body["allowed_transitions"], json!([]));
}

#[tokio::test]
async fn test_shop_cannot_create_order() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(
            As::Shop("shop-a"),
            "/api/v1/orders",
            json!({ "shop_id": "shop-a", "total_pages": 1, "total_price": "0.10" }),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_full_lifecycle_retires_order_and_blobs() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let attached = fixture
        .post(
            As::Customer("alice"),
            &format!("/api/v1/orders/{}/files", id),
            files_body(),
        )
        .await;
    assert_status!(attached, StatusCode::OK);
    assert_eq!(attached.body["files"].as_array().unwrap().len(), 2);

    let seen_by_shop = fixture
        .get(As::Shop("shop-a"), &format!("/api/v1/orders/{}", id))
        .await;
    assert_status!(seen_by_shop, StatusCode::OK);
    assert_eq!(
        seen_by_shop.body["allowed_transitions"],
        json!(["printing", "failed", "rejected"])
    );

    let printing = fixture.advance("shop-a", &id, &["printing"]).await;
    assert_eq!(printing.body["previous"], "pending");
    assert_eq!(printing.body["order"]["status"], "printing");
    assert!(printing.body["retirement"].is_null());

    let done = fixture.advance("shop-a", &id, &["ready", "completed"]).await;
    assert_eq!(done.body["order"]["status"], "completed");
    assert_eq!(done.body["retirement"]["result"], "retired");
    let report = done.body["retirement"]["files"].as_array().unwrap();
    assert_eq!(report.len(), 2);
    assert!(report.iter().all(|f| f["outcome"] == "deleted"));

    let mut deleted = fixture.storage.deleted_handles().await;
    deleted.sort();
    assert_eq!(deleted, vec!["printdrop/cover", "printdrop/thesis"]);

    // The record is gone for both parties.
    let gone = fixture
        .get(As::Customer("alice"), &format!("/api/v1/orders/{}", id))
        .await;
    assert_status!(gone, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rejection_retires_order() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;
    fixture
        .post(
            As::Customer("alice"),
            &format!("/api/v1/orders/{}/files", id),
            files_body(),
        )
        .await;

    let rejected = fixture.advance("shop-a", &id, &["rejected"]).await;
    assert_eq!(rejected.body["retirement"]["result"], "retired");
    assert!(fixture.store.get(&id).unwrap().is_none());
    assert_eq!(fixture.storage.deleted_handles().await.len(), 2);
}

#[tokio::test]
async fn test_storage_failures_do_not_block_retirement() {
    let fixture = TestFixture::new().await;
    fixture.storage.fail_all().await;

    let id = fixture.create_order("alice", "shop-a").await;
    fixture
        .post(
            As::Customer("alice"),
            &format!("/api/v1/orders/{}/files", id),
            files_body(),
        )
        .await;

    let failed = fixture.advance("shop-a", &id, &["failed"]).await;
    assert_eq!(failed.body["retirement"]["result"], "retired");
    let report = failed.body["retirement"]["files"].as_array().unwrap();
    assert!(report.iter().all(|f| f["outcome"] == "failed"));
    // Both namespaces were probed for each file.
    assert_eq!(fixture.storage.call_count().await, 4);
    assert!(fixture.store.get(&id).unwrap().is_none());

    let audited = fixture.wait_for_audit("blob_delete_failed", 2).await;
    assert!(audited.iter().all(|r| r.order_id.as_deref() == Some(id.as_str())));
}

#[tokio::test]
async fn test_namespace_probing_falls_through_to_raw() {
    let fixture = TestFixture::new().await;
    fixture.storage.fail_namespace("image").await;

    let id = fixture.create_order("alice", "shop-a").await;
    fixture
        .post(
            As::Customer("alice"),
            &format!("/api/v1/orders/{}/files", id),
            files_body(),
        )
        .await;

    let done = fixture.advance("shop-a", &id, &["rejected"]).await;
    let report = done.body["retirement"]["files"].as_array().unwrap();
    assert!(report.iter().all(|f| f["namespace"] == "raw"));
}

#[tokio::test]
async fn test_order_without_files_is_retired() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let done = fixture.advance("shop-a", &id, &["rejected"]).await;
    assert_eq!(done.body["retirement"]["result"], "retired");
    assert_eq!(fixture.storage.call_count().await, 0);
}

// =============================================================================
// Validation and authorization
// =============================================================================

#[tokio::test]
async fn test_invalid_status_is_bad_request() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .put(
            As::Shop("shop-a"),
            &format!("/api/v1/orders/{}/status", id),
            json!({ "status": "shipped" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("shipped"));
}

#[tokio::test]
async fn test_illegal_transition_is_conflict() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .put(
            As::Shop("shop-a"),
            &format!("/api/v1/orders/{}/status", id),
            json!({ "status": "completed" }),
        )
        .await;
    assert_status!(response, StatusCode::CONFLICT);

    let order = fixture.store.get(&id).unwrap().unwrap();
    assert_eq!(order.status.as_str(), "pending");
}

#[tokio::test]
async fn test_customer_cannot_update_status() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .put(
            As::Customer("alice"),
            &format!("/api/v1/orders/{}/status", id),
            json!({ "status": "printing" }),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_other_shop_cannot_touch_order() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let get = fixture
        .get(As::Shop("shop-b"), &format!("/api/v1/orders/{}", id))
        .await;
    assert_status!(get, StatusCode::FORBIDDEN);

    let update = fixture
        .put(
            As::Shop("shop-b"),
            &format!("/api/v1/orders/{}/status", id),
            json!({ "status": "printing" }),
        )
        .await;
    assert_status!(update, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_other_customer_cannot_see_order() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .get(As::Customer("bob"), &format!("/api/v1/orders/{}", id))
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .get(As::Customer("alice"), "/api/v1/orders/does-not-exist")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_files_attach_once() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;
    let path = format!("/api/v1/orders/{}/files", id);

    let first = fixture.post(As::Customer("alice"), &path, files_body()).await;
    assert_status!(first, StatusCode::OK);

    let second = fixture.post(As::Customer("alice"), &path, files_body()).await;
    assert_status!(second, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_shop_cannot_attach_files() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .post(
            As::Shop("shop-a"),
            &format!("/api/v1/orders/{}/files", id),
            files_body(),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_orders_is_scoped_by_role() {
    let fixture = TestFixture::new().await;
    fixture.create_order("alice", "shop-a").await;
    fixture.create_order("alice", "shop-b").await;
    fixture.create_order("bob", "shop-a").await;

    let alice = fixture.get(As::Customer("alice"), "/api/v1/orders").await;
    assert_status!(alice, StatusCode::OK);
    assert_eq!(alice.body["total"], 2);

    let shop_a = fixture.get(As::Shop("shop-a"), "/api/v1/orders").await;
    assert_eq!(shop_a.body["total"], 2);
    assert!(shop_a.body["orders"]
        .as_array()
        .unwrap()
        .iter()
        .all(|o| o["shop_id"] == "shop-a"));
}

// =============================================================================
// Manual retire
// =============================================================================

#[tokio::test]
async fn test_retire_missing_order_is_already_gone() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(As::Shop("shop-a"), "/api/v1/orders/missing/retire", json!({}))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["result"], "already_gone");
}

#[tokio::test]
async fn test_retire_active_order_is_conflict() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .post(
            As::Shop("shop-a"),
            &format!("/api/v1/orders/{}/retire", id),
            json!({}),
        )
        .await;
    assert_status!(response, StatusCode::CONFLICT);
    assert!(fixture.store.get(&id).unwrap().is_some());
}

#[tokio::test]
async fn test_customer_cannot_retire() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .post(
            As::Customer("alice"),
            &format!("/api/v1/orders/{}/retire", id),
            json!({}),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
}

// =============================================================================
// Watches
// =============================================================================

#[tokio::test]
async fn test_watch_refuses_other_parties_before_upgrade() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;
    let path = format!("/api/v1/orders/{}/watch", id);

    let response = fixture.get(As::Customer("bob"), &path).await;
    assert_status!(response, StatusCode::FORBIDDEN);

    let response = fixture.get(As::Anonymous, &path).await;
    assert_status!(response, StatusCode::UNAUTHORIZED);

    let response = fixture
        .get(As::Customer("alice"), "/api/v1/orders/missing/watch")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_watch_requires_websocket_upgrade() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_order("alice", "shop-a").await;

    let response = fixture
        .get(As::Customer("alice"), &format!("/api/v1/orders/{}/watch", id))
        .await;
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_shop_watch_is_shop_only() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .get(As::Customer("alice"), "/api/v1/shops/me/orders/watch")
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
}
