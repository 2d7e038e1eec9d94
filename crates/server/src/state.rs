use std::sync::Arc;
use printdrop_core::{
    AuditHandle, AuditStore, Authenticator, ChangeFeed, Config, OrderService, SanitizedConfig,
    ShopDirectory,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
    orders: Arc<OrderService>,
    feed: ChangeFeed,
    directory: Arc<dyn ShopDirectory>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        orders: Arc<OrderService>,
        feed: ChangeFeed,
        directory: Arc<dyn ShopDirectory>,
    ) -> Self {
        Self {
            config,
            authenticator,
            audit,
            audit_store,
            orders,
            feed,
            directory,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn orders(&self) -> &OrderService {
        self.orders.as_ref()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn directory(&self) -> &dyn ShopDirectory {
        self.directory.as_ref()
    }
}
