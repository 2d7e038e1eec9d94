use serde::Serialize;
use sha2::{Digest, Sha256};

/// Form body of a signed destroy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedDestroyParams {
    pub public_id: String,
    pub timestamp: i64,
    pub api_key: String,
    pub signature: String,
    pub signature_algorithm: &'static str,
}

/// Signs destroy requests with the account secret.
///
/// The signature covers the handle and a unix timestamp, so a captured
/// request expires server-side.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    api_secret: String,
}

impl RequestSigner {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Build signed parameters for deleting `handle` at `timestamp` (unix seconds).
    pub fn sign(&self, handle: &str, timestamp: i64) -> SignedDestroyParams {
        // Parameters are sorted by name and joined before the secret is appended.
        let payload = format!("public_id={}&timestamp={}{}", handle, timestamp, self.api_secret);
        let signature = format!("{:x}", Sha256::digest(payload.as_bytes()));

        SignedDestroyParams {
            public_id: handle.to_string(),
            timestamp,
            api_key: self.api_key.clone(),
            signature,
            signature_algorithm: "sha256",
        }
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
