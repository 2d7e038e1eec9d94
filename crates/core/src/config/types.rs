use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub shops: Vec<ShopConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Gateway key (required when method = "api_key")
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Identity asserted by an upstream session layer via headers.
    TrustedHeaders,
    /// Like `TrustedHeaders`, but the gateway must also present a shared key.
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::TrustedHeaders => "trusted_headers",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("printdrop.db")
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Cloud (account) name used in the API path
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// API base URL (default: "https://api.cloudinary.com")
    #[serde(default = "default_storage_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds (default: 15)
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u32,
    /// Namespaces probed in order when deleting a blob
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            base_url: default_storage_base_url(),
            timeout_secs: default_storage_timeout(),
            namespaces: default_namespaces(),
        }
    }
}

/// Available object storage backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Cloudinary,
    /// Blob deletion is skipped; only records are removed.
    #[default]
    Disabled,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Cloudinary => "cloudinary",
            StorageBackend::Disabled => "disabled",
        }
    }
}

fn default_storage_base_url() -> String {
    "https://api.cloudinary.com".to_string()
}

fn default_storage_timeout() -> u32 {
    15
}

fn default_namespaces() -> Vec<String> {
    vec!["image".to_string(), "raw".to_string()]
}

/// Live subscription configuration
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct FeedConfig {
    /// Capacity of the store's change broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Snapshots buffered per subscriber before the watcher waits
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

fn default_subscriber_buffer() -> usize {
    16
}

/// Shop ranking configuration
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct DirectoryConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

/// A print shop known to the directory
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ShopConfig {
    pub id: String,
    pub name: String,
    pub price_per_page: Decimal,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: SanitizedStorageConfig,
    pub feed: FeedConfig,
    pub directory: DirectoryConfig,
    pub shops: Vec<ShopConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

/// Sanitized storage config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub backend: String,
    pub cloud_name: String,
    pub base_url: String,
    pub timeout_secs: u32,
    pub namespaces: Vec<String>,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            storage: SanitizedStorageConfig {
                backend: config.storage.backend.as_str().to_string(),
                cloud_name: config.storage.cloud_name.clone(),
                base_url: config.storage.base_url.clone(),
                timeout_secs: config.storage.timeout_secs,
                namespaces: config.storage.namespaces.clone(),
                credentials_configured: !config.storage.api_key.is_empty()
                    && !config.storage.api_secret.is_empty(),
            },
            feed: config.feed,
            directory: config.directory,
            shops: config.shops.clone(),
        }
    }
}
