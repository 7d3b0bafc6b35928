//! The admission engine: turns one counter-store round trip into a
//! [`RateLimitDecision`], folding in the unlimited short-circuit and the
//! fail-open policy.
//!
//! Grounded on `rate_limit/strategy.py::SlidingWindowStrategy.apply_limit`
//! and `_get_sleep_time`.

use log::debug;

use crate::models::decision::RateLimitDecision;
use crate::models::rate_spec::{Limit, RateSpec};
use crate::services::counter_store::{Admission, CounterStoreClient};

/// Runs one admission check for `spec` against `key`. Never returns an
/// error: any counter-store failure resolves to [`RateLimitDecision::Admit`]
/// per spec.md §4.3 / §7's fail-open policy.
pub async fn check(
    counter: &dyn CounterStoreClient,
    key: &str,
    spec: Limit,
    now_ticks: u64,
    clock_accuracy: u64,
    max_sleep_seconds: f64,
) -> RateLimitDecision {
    let spec = match spec {
        Limit::Unlimited => return RateLimitDecision::Admit,
        Limit::Spec(spec) => spec,
    };

    let window_ticks = spec.window_ticks(clock_accuracy);
    let max_sleep_ticks = (max_sleep_seconds * clock_accuracy as f64).round().max(0.0) as u64;

    match counter
        .check_and_record(key, now_ticks, window_ticks, spec.max_count, max_sleep_ticks)
        .await
    {
        Ok(Admission::Admitted) => RateLimitDecision::Admit,
        Ok(Admission::AdmittedAfterSleep { sleep_ticks }) => RateLimitDecision::AdmitAfterSleep {
            seconds: sleep_ticks as f64 / clock_accuracy as f64,
        },
        Ok(Admission::Rejected { retry_after_ticks }) => {
            let retry_after_seconds = (retry_after_ticks as f64 / clock_accuracy as f64).ceil() as u64;
            RateLimitDecision::Reject {
                retry_after_seconds: retry_after_seconds.max(1),
                applied_spec: spec,
            }
        }
        Err(err) => {
            debug!("counter store error for key {key}, failing open: {err}");
            RateLimitDecision::Admit
        }
    }
}

/// Builds the opaque counter-store key for (scope-or-"global", action,
/// target_type_uri), per spec.md §3.
pub fn build_key(scope_or_global: &str, action: &str, target_type_uri: &str) -> String {
    format!("ratelimit_{scope_or_global}_{action}_{target_type_uri}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rate_spec::TimeUnit;
    use async_trait::async_trait;

    struct AlwaysAdmits;

    #[async_trait]
    impl CounterStoreClient for AlwaysAdmits {
        async fn check_and_record(
            &self,
            _key: &str,
            _now_ticks: u64,
            _window_ticks: u64,
            _max_count: u64,
            _max_sleep_ticks: u64,
        ) -> Result<Admission, crate::models::error::RateLimitError> {
            Ok(Admission::Admitted)
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    struct AlwaysErrors;

    #[async_trait]
    impl CounterStoreClient for AlwaysErrors {
        async fn check_and_record(
            &self,
            _key: &str,
            _now_ticks: u64,
            _window_ticks: u64,
            _max_count: u64,
            _max_sleep_ticks: u64,
        ) -> Result<Admission, crate::models::error::RateLimitError> {
            Err(crate::models::error::RateLimitError::StoreUnavailable("down".into()))
        }

        async fn is_available(&self) -> bool {
            false
        }
    }

    fn sample_spec() -> Limit {
        Limit::Spec(RateSpec {
            max_count: 2,
            window_value: 1,
            window_unit: TimeUnit::Minute,
        })
    }

    #[tokio::test]
    async fn unlimited_never_touches_the_store() {
        let decision = check(&AlwaysErrors, "k", Limit::Unlimited, 0, 1000, 20.0).await;
        assert_eq!(decision, RateLimitDecision::Admit);
    }

    #[tokio::test]
    async fn store_error_fails_open() {
        let decision = check(&AlwaysErrors, "k", sample_spec(), 0, 1000, 20.0).await;
        assert_eq!(decision, RateLimitDecision::Admit);
    }

    #[tokio::test]
    async fn healthy_store_admits() {
        let decision = check(&AlwaysAdmits, "k", sample_spec(), 0, 1000, 20.0).await;
        assert_eq!(decision, RateLimitDecision::Admit);
    }

    #[test]
    fn key_layout_matches_prefix_convention() {
        assert_eq!(build_key("global", "update", "account/container"), "ratelimit_global_update_account/container");
    }
}
