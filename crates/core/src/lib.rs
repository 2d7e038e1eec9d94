pub mod audit;
pub mod auth;
pub mod cleanup;
pub mod config;
pub mod feed;
pub mod lifecycle;
pub mod metrics;
pub mod order;
pub mod shop;
pub mod storage;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    Role, TrustedHeaderAuthenticator,
};
pub use cleanup::{
    BlobOutcome, CleanupCoordinator, CleanupError, CleanupOutcome, CleanupReport, DeletionPlan,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DatabaseConfig, DirectoryConfig, FeedConfig, SanitizedConfig, ServerConfig,
    ShopConfig, StorageBackend, StorageConfig,
};
pub use feed::{ChangeFeed, Snapshot, Subscription, WatchQuery};
pub use lifecycle::{LifecycleError, OrderService, ShopOrderSummary, StatusUpdate};
pub use order::{
    Actor, CreateOrderRequest, FileRef, Order, OrderError, OrderFilter, OrderStatus, OrderStore,
    SqliteOrderStore,
};
pub use shop::{ConfiguredShopDirectory, GeoPoint, RankedShop, Shop, ShopDirectory, ShopError};
pub use storage::{CloudinaryStorage, ObjectStorage, StorageError, StorageNamespace};
