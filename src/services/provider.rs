//! The stable contract between the decision pipeline and whichever limit
//! source backs it, per spec.md §9 "Provider polymorphism".

use crate::models::rate_spec::Limit;
use crate::services::counter_store::QuotaCache;
use crate::services::quota_provider::RemoteRateLimitProvider;
use crate::services::static_provider::StaticRateLimitProvider;

#[async_trait::async_trait]
pub trait LimitProvider: Send + Sync {
    fn global_limit(&self, action: &str, target_type_uri: &str) -> Limit;

    async fn local_limit(
        &self,
        scope: &str,
        action: &str,
        target_type_uri: &str,
        domain_id: Option<&str>,
    ) -> Limit;
}

#[async_trait::async_trait]
impl LimitProvider for StaticRateLimitProvider {
    fn global_limit(&self, action: &str, target_type_uri: &str) -> Limit {
        StaticRateLimitProvider::global_limit(self, action, target_type_uri)
    }

    async fn local_limit(
        &self,
        _scope: &str,
        action: &str,
        target_type_uri: &str,
        _domain_id: Option<&str>,
    ) -> Limit {
        // Scope is part of the contract but unused in lookup: per-scope
        // limits are uniform across scopes (spec.md §4.4).
        StaticRateLimitProvider::local_limit(self, action, target_type_uri)
    }
}

#[async_trait::async_trait]
impl<C: QuotaCache + Send + Sync> LimitProvider for RemoteRateLimitProvider<C> {
    fn global_limit(&self, action: &str, target_type_uri: &str) -> Limit {
        RemoteRateLimitProvider::global_limit(self, action, target_type_uri)
    }

    async fn local_limit(
        &self,
        scope: &str,
        action: &str,
        target_type_uri: &str,
        domain_id: Option<&str>,
    ) -> Limit {
        RemoteRateLimitProvider::local_limit(self, scope, action, target_type_uri, domain_id.unwrap_or_default())
            .await
    }
}
