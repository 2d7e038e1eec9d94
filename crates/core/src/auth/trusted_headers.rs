use async_trait::async_trait;

use super::{
    AuthError, AuthRequest, Authenticator, Identity, Role, SUBJECT_ID_HEADER, SUBJECT_ROLE_HEADER,
};

/// Authenticator that trusts the identity asserted by an upstream session layer.
/// Must be explicitly configured and only deployed behind that layer.
pub struct TrustedHeaderAuthenticator;

impl TrustedHeaderAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TrustedHeaderAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

/// Read `{subject_id, role}` from the request headers.
pub(crate) fn identity_from_headers(
    request: &AuthRequest,
    method: &str,
) -> Result<Identity, AuthError> {
    let subject_id = request
        .headers
        .get(SUBJECT_ID_HEADER)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::NotAuthenticated)?;

    let role: Role = request
        .headers
        .get(SUBJECT_ROLE_HEADER)
        .ok_or(AuthError::NotAuthenticated)?
        .trim()
        .parse()
        .map_err(AuthError::InvalidCredentials)?;

    Ok(Identity::new(subject_id, role, method))
}

#[async_trait]
impl Authenticator for TrustedHeaderAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        identity_from_headers(request, self.method_name())
    }

    fn method_name(&self) -> &'static str {
        "trusted_headers"
    }
}
