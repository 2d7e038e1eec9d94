//! Cloudinary-compatible destroy API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::StorageConfig;

use super::{ObjectStorage, RequestSigner, StorageError, StorageNamespace};

/// Response body of the destroy endpoint.
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Object storage backed by the Cloudinary upload API.
pub struct CloudinaryStorage {
    client: Client,
    base_url: String,
    cloud_name: String,
    signer: RequestSigner,
}

impl CloudinaryStorage {
    /// Create a client from configuration.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.cloud_name.is_empty() {
            return Err(StorageError::Configuration(
                "cloud_name is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| {
                StorageError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            signer: RequestSigner::new(config.api_key.clone(), config.api_secret.clone()),
        })
    }

    fn destroy_url(&self, namespace: &StorageNamespace) -> String {
        format!(
            "{}/v1_1/{}/{}/destroy",
            self.base_url, self.cloud_name, namespace
        )
    }
}

#[async_trait]
impl ObjectStorage for CloudinaryStorage {
    fn name(&self) -> &str {
        "cloudinary"
    }

    async fn destroy(
        &self,
        handle: &str,
        namespace: &StorageNamespace,
    ) -> Result<(), StorageError> {
        let params = self.signer.sign(handle, Utc::now().timestamp());
        let url = self.destroy_url(namespace);
        debug!(handle, namespace = %namespace, "Deleting blob");

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Timeout
                } else if e.is_connect() {
                    StorageError::ConnectionFailed(e.to_string())
                } else {
                    StorageError::Api(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                namespace: namespace.clone(),
                reason: format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            });
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Api(format!("Failed to parse response: {}", e)))?;

        match body.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(StorageError::NotFound {
                namespace: namespace.clone(),
            }),
            other => Err(StorageError::Rejected {
                namespace: namespace.clone(),
                reason: format!("result: {}", other),
            }),
        }
    }
}
