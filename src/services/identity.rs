//! Bearer-token acquisition for the remote quota provider.
//!
//! Full identity federation (Keystone v3 password/token auth, catalog
//! discovery) is out of scope here — spec.md treats the identity service as
//! an explicit external collaborator. This module only defines the thin
//! interface the quota provider needs, grounded on how `provider.py`'s
//! `LimesRateLimitProvider` consumes `keystoneauth1.session.Session`:
//! a token string and a way to discover the quota service's base URL.

use crate::models::error::RateLimitError;

/// Supplies a bearer token and the quota service's base URL. An
/// implementation backed by a real identity service would refresh the
/// token on expiry; this interface doesn't care how.
#[async_trait::async_trait]
pub trait IdentityClient: Send + Sync {
    /// A valid bearer token for `X-Auth-Token`.
    async fn token(&self) -> Result<String, RateLimitError>;

    /// The quota service's base URL (e.g. Limes' public endpoint),
    /// discovered from the service catalog. Returns `None` if discovery
    /// has not succeeded yet.
    async fn quota_service_base_url(&self) -> Option<String>;
}

/// An identity client configured with a static token and base URL — used
/// when the deployment already knows both (e.g. supplied via configuration
/// or a sidecar) and does not need catalog discovery.
pub struct StaticIdentityClient {
    token: String,
    base_url: String,
}

impl StaticIdentityClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        StaticIdentityClient {
            token: token.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl IdentityClient for StaticIdentityClient {
    async fn token(&self) -> Result<String, RateLimitError> {
        Ok(self.token.clone())
    }

    async fn quota_service_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
