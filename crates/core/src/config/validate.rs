use std::collections::HashSet;

use super::{
    types::{AuthMethod, Config, StorageBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde), api_key set for api_key auth
/// - Server port is not 0
/// - Storage credentials present for the cloudinary backend, namespaces non-empty
/// - Feed capacities are non-zero
/// - Shop ids are unique and prices non-negative
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key is required when auth.method = \"api_key\"".to_string(),
        ));
    }

    // Storage validation
    let storage = &config.storage;
    if storage.namespaces.is_empty() || storage.namespaces.iter().any(|n| n.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "storage.namespaces must list at least one non-empty namespace".to_string(),
        ));
    }
    if storage.backend == StorageBackend::Cloudinary {
        for (field, value) in [
            ("cloud_name", &storage.cloud_name),
            ("api_key", &storage.api_key),
            ("api_secret", &storage.api_secret),
        ] {
            if value.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "storage.{} is required for the cloudinary backend",
                    field
                )));
            }
        }
        if storage.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "storage.timeout_secs cannot be 0".to_string(),
            ));
        }
    }

    // Feed validation
    if config.feed.channel_capacity == 0 || config.feed.subscriber_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "feed.channel_capacity and feed.subscriber_buffer must be positive".to_string(),
        ));
    }

    // Shop validation
    let mut seen = HashSet::new();
    for shop in &config.shops {
        if shop.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shops.id cannot be empty".to_string(),
            ));
        }
        if !seen.insert(shop.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate shop id: {}",
                shop.id
            )));
        }
        if shop.price_per_page.is_sign_negative() && !shop.price_per_page.is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "shop {} has a negative price_per_page",
                shop.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config(toml: &str) -> Config {
        load_config_from_str(toml).unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        let config = config(
            r#"
[auth]
method = "trusted_headers"
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = config(
            r#"
[auth]
method = "trusted_headers"

[server]
port = 0
"#,
        );
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_api_key_required() {
        let config = config(
            r#"
[auth]
method = "api_key"
"#,
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_cloudinary_requires_credentials() {
        let config = config(
            r#"
[auth]
method = "trusted_headers"

[storage]
backend = "cloudinary"
cloud_name = "demo"
api_key = "key"
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("api_secret"));
    }

    #[test]
    fn test_validate_empty_namespaces_fails() {
        let config = config(
            r#"
[auth]
method = "trusted_headers"

[storage]
namespaces = []
"#,
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_feed_capacity_fails() {
        let config = config(
            r#"
[auth]
method = "trusted_headers"

[feed]
subscriber_buffer = 0
"#,
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_shop_ids_fail() {
        let config = config(
            r#"
[auth]
method = "trusted_headers"

[[shops]]
id = "s1"
name = "A"
price_per_page = "0.10"
lat = 0.0
lng = 0.0

[[shops]]
id = "s1"
name = "B"
price_per_page = "0.20"
lat = 1.0
lng = 1.0
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate shop id"));
    }

    #[test]
    fn test_validate_negative_price_fails() {
        let config = config(
            r#"
[auth]
method = "trusted_headers"

[[shops]]
id = "s1"
name = "A"
price_per_page = "-0.10"
lat = 0.0
lng = 0.0
"#,
        );
        assert!(validate_config(&config).is_err());
    }
}
