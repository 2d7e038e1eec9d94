//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock object storage injected, so order retirement can be observed
//! without a real blob store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use printdrop_core::{
    create_audit_system, AuditStore, AuthConfig, AuthMethod, ChangeFeed, CleanupCoordinator,
    Config, ConfiguredShopDirectory, DatabaseConfig, DeletionPlan, OrderService, OrderStore,
    ServerConfig, ShopConfig, ShopDirectory, SqliteAuditStore, SqliteOrderStore,
    TrustedHeaderAuthenticator,
    testing::MockObjectStorage,
};

/// Re-export fixtures for test convenience
pub use printdrop_core::testing::fixtures;

/// Who a request is sent as.
#[derive(Debug, Clone, Copy)]
pub enum As<'a> {
    Customer(&'a str),
    Shop(&'a str),
    Anonymous,
}

/// Test fixture for E2E testing.
///
/// Runs the full router in-process with trusted-header auth, a SQLite
/// database in a temp dir, two configured shops (`shop-a` near, `shop-b`
/// further away) and a [`MockObjectStorage`] behind the cleanup coordinator.
pub struct TestFixture {
    pub router: Router,
    /// Mock blob storage - inspect or fail deletes
    pub storage: Arc<MockObjectStorage>,
    /// Direct access to the order store
    pub store: Arc<dyn OrderStore>,
    /// Direct access to the audit store
    pub audit_store: Arc<dyn AuditStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub fn test_shops() -> Vec<ShopConfig> {
    vec![
        ShopConfig {
            id: "shop-a".to_string(),
            name: "Corner Copies".to_string(),
            price_per_page: Decimal::new(10, 2),
            lat: 45.4642,
            lng: 9.1900,
            available: true,
        },
        ShopConfig {
            id: "shop-b".to_string(),
            name: "Campus Print".to_string(),
            price_per_page: Decimal::new(5, 2),
            lat: 45.4800,
            lng: 9.2300,
            available: true,
        },
    ]
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::TrustedHeaders,
                api_key: None,
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            storage: Default::default(),
            feed: Default::default(),
            directory: Default::default(),
            shops: test_shops(),
        };

        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );
        let store: Arc<dyn OrderStore> = Arc::new(
            SqliteOrderStore::new(&db_path).expect("Failed to create order store"),
        );

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let storage = Arc::new(MockObjectStorage::new());
        let cleanup = CleanupCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&storage) as Arc<dyn printdrop_core::ObjectStorage>,
            DeletionPlan::default(),
        )
        .with_audit(audit_handle.clone());

        let orders = Arc::new(
            OrderService::new(Arc::clone(&store), Arc::new(cleanup))
                .with_audit(audit_handle.clone()),
        );
        let feed = ChangeFeed::new(Arc::clone(&store), config.feed);
        let directory: Arc<dyn ShopDirectory> = Arc::new(
            ConfiguredShopDirectory::new(&config.shops, config.directory, Arc::clone(&store))
                .with_audit(audit_handle.clone()),
        );

        let state = Arc::new(printdrop_server::state::AppState::new(
            config,
            Arc::new(TrustedHeaderAuthenticator::new()),
            audit_handle,
            Arc::clone(&audit_store),
            orders,
            feed,
            directory,
        ));

        let router = printdrop_server::api::create_router(state);

        Self {
            router,
            storage,
            store,
            audit_store,
            temp_dir,
        }
    }

    pub async fn get(&self, who: As<'_>, path: &str) -> TestResponse {
        self.request(who, "GET", path, None).await
    }

    pub async fn post(&self, who: As<'_>, path: &str, body: Value) -> TestResponse {
        self.request(who, "POST", path, Some(body)).await
    }

    pub async fn put(&self, who: As<'_>, path: &str, body: Value) -> TestResponse {
        self.request(who, "PUT", path, Some(body)).await
    }

    /// Create an order for `customer` at `shop` and return its id.
    pub async fn create_order(&self, customer: &str, shop: &str) -> String {
        let response = self
            .post(
                As::Customer(customer),
                "/api/v1/orders",
                serde_json::json!({
                    "shop_id": shop,
                    "total_pages": 10,
                    "total_price": "1.50"
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"]
            .as_str()
            .expect("order id")
            .to_string()
    }

    /// Move an order through the given statuses as its shop.
    pub async fn advance(&self, shop: &str, order_id: &str, statuses: &[&str]) -> TestResponse {
        let mut last = None;
        for status in statuses {
            let response = self
                .put(
                    As::Shop(shop),
                    &format!("/api/v1/orders/{}/status", order_id),
                    serde_json::json!({ "status": status }),
                )
                .await;
            assert_eq!(response.status, StatusCode::OK, "{}", response.body);
            last = Some(response);
        }
        last.expect("at least one status")
    }

    /// Wait until the audit writer has persisted at least `count` events of `event_type`.
    pub async fn wait_for_audit(&self, event_type: &str, count: usize) -> Vec<printdrop_core::AuditRecord> {
        let filter = printdrop_core::AuditFilter::new().with_event_type(event_type);
        for _ in 0..50 {
            let records = self.audit_store.query(&filter).expect("audit query");
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {} x{}", event_type, count);
    }

    async fn request(
        &self,
        who: As<'_>,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        request_builder = match who {
            As::Customer(id) => request_builder
                .header("X-Subject-Id", id)
                .header("X-Subject-Role", "customer"),
            As::Shop(id) => request_builder
                .header("X-Subject-Id", id)
                .header("X-Subject-Role", "shop"),
            As::Anonymous => request_builder,
        };

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
