//! Remote (Limes-like) quota provider.
//!
//! Grounded on `rate_limit/provider.py::LimesRateLimitProvider`: per-scope
//! local limits are fetched from a quota service and cached in the counter
//! store for `refresh_interval_seconds`; the quota service's base URL is
//! discovered lazily and memoized once found, but a failed discovery
//! attempt is never cached so the next request retries it.

use std::sync::Arc;

use log::{debug, error};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::models::error::RateLimitError;
use crate::models::rate_spec::{parse_rate_spec, Limit};
use crate::services::counter_store::QuotaCache;
use crate::services::identity::IdentityClient;

/// One project's rates as returned by the quota service, filtered to the
/// service type this middleware instance cares about.
#[derive(Debug, Deserialize)]
struct ProjectRates {
    id: String,
    rates: Vec<ServiceRate>,
}

#[derive(Debug, Deserialize)]
struct ServiceRate {
    #[serde(rename = "type")]
    service_type: String,
    limits: Vec<RateLimitEntry>,
}

#[derive(Debug, Deserialize)]
struct RateLimitEntry {
    target_type_uri: String,
    action: String,
    limit: String,
}

#[derive(Debug, Deserialize)]
struct DomainRatesResponse {
    projects: Vec<ProjectRates>,
}

/// Fetches per-scope local limits from a remote quota service, with a
/// Redis-backed cache in front of it.
pub struct RemoteRateLimitProvider<C> {
    service_type: String,
    http: reqwest::Client,
    identity: Arc<dyn IdentityClient>,
    cache: Arc<C>,
    refresh_interval_seconds: u64,
    cached_base_url: RwLock<Option<String>>,
}

impl<C: QuotaCache> RemoteRateLimitProvider<C> {
    pub fn new(
        service_type: impl Into<String>,
        identity: Arc<dyn IdentityClient>,
        cache: Arc<C>,
        refresh_interval_seconds: u64,
    ) -> Self {
        RemoteRateLimitProvider {
            service_type: service_type.into(),
            http: reqwest::Client::new(),
            identity,
            cache,
            refresh_interval_seconds,
            cached_base_url: RwLock::new(None),
        }
    }

    /// Global limits are not modeled by Limes today; mirrors the Python
    /// provider returning unlimited unconditionally.
    pub fn global_limit(&self, _action: &str, _target_type_uri: &str) -> Limit {
        Limit::Unlimited
    }

    pub async fn local_limit(
        &self,
        scope: &str,
        action: &str,
        target_type_uri: &str,
        domain_id: &str,
    ) -> Limit {
        let cache_key = format!("quota:{scope}:{action}:{target_type_uri}");

        match self.cache.get_cached_limit(&cache_key).await {
            Ok(Some(raw)) => return parse_rate_spec(&raw),
            Ok(None) => {}
            Err(err) => debug!("quota cache read failed, falling through to remote fetch: {err}"),
        }

        match self.fetch_and_cache_domain(domain_id, scope, action, target_type_uri).await {
            Ok(limit) => limit,
            Err(err) => {
                error!("quota provider unavailable for scope {scope}: {err}");
                Limit::Unlimited
            }
        }
    }

    async fn fetch_and_cache_domain(
        &self,
        domain_id: &str,
        scope: &str,
        action: &str,
        target_type_uri: &str,
    ) -> Result<Limit, RateLimitError> {
        let base_url = self.base_url().await?;
        let token = self.identity.token().await?;

        let url = format!("{}/v1/domains/{}", base_url.trim_end_matches('/'), domain_id);
        let response = self
            .http
            .get(&url)
            .query(&[("service", self.service_type.as_str()), ("rates", "only")])
            .header("X-AUTH-TOKEN", token)
            .send()
            .await?
            .error_for_status()?;

        let parsed: DomainRatesResponse = response.json().await?;

        let mut entries = Vec::new();
        let mut matched = Limit::Unlimited;
        for project in &parsed.projects {
            for rate in project.rates.iter().filter(|r| r.service_type == self.service_type) {
                for limit_entry in &rate.limits {
                    let key = format!(
                        "quota:{}:{}:{}",
                        project.id, limit_entry.action, limit_entry.target_type_uri
                    );
                    entries.push((key.clone(), limit_entry.limit.clone()));
                    if project.id == scope
                        && limit_entry.action == action
                        && limit_entry.target_type_uri == target_type_uri
                    {
                        matched = parse_rate_spec(&limit_entry.limit);
                    }
                }
            }
        }

        if let Err(err) = self.cache.set_cached_limits(&entries, self.refresh_interval_seconds).await {
            debug!("failed to populate quota cache: {err}");
        }

        Ok(matched)
    }

    async fn base_url(&self) -> Result<String, RateLimitError> {
        if let Some(url) = self.cached_base_url.read().await.clone() {
            return Ok(url);
        }
        let discovered = self
            .identity
            .quota_service_base_url()
            .await
            .ok_or_else(|| RateLimitError::ProviderUnavailable("quota service base url unknown".into()))?;
        *self.cached_base_url.write().await = Some(discovered.clone());
        Ok(discovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::StaticIdentityClient;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeCache {
        stored: Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait]
    impl QuotaCache for FakeCache {
        async fn get_cached_limit(&self, key: &str) -> Result<Option<String>, RateLimitError> {
            Ok(self.stored.lock().unwrap().get(key).cloned())
        }

        async fn set_cached_limits(
            &self,
            entries: &[(String, String)],
            _ttl_seconds: u64,
        ) -> Result<(), RateLimitError> {
            let mut stored = self.stored.lock().unwrap();
            for (k, v) in entries {
                stored.insert(k.clone(), v.clone());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_remote_fetch() {
        let mut seed = std::collections::HashMap::new();
        seed.insert("quota:proj-1:update:account/container".to_string(), "3r/m".to_string());
        let cache = Arc::new(FakeCache {
            stored: Mutex::new(seed),
        });
        let identity: Arc<dyn IdentityClient> =
            Arc::new(StaticIdentityClient::new("token", "http://limes.example"));
        let provider = RemoteRateLimitProvider::new("object-store", identity, cache, 300);

        let limit = provider
            .local_limit("proj-1", "update", "account/container", "domain-1")
            .await;
        assert!(matches!(limit, Limit::Spec(_)));
    }
}
