//! The decision pipeline: classify → whitelist → blacklist → global limit →
//! local limit, in that order, short-circuiting at the first terminal
//! outcome.
//!
//! Grounded on `rate_limit.py`'s `__call__` and `_rate_limit`: the pipeline
//! owns everything between "a request with classification attributes
//! arrived" and "here is the decision", and is deliberately independent of
//! whichever web framework invokes it — [`crate::middleware::rate_limit`]
//! is the Actix Web adapter around this module.

use std::sync::Arc;

use log::{debug, info};

use crate::models::classification::{extract_classification, RequestClassification, RequestAttributes, ScopeSource};
use crate::models::response::ResponseSpec;
use crate::models::rules::RuleIndex;
use crate::services::admission::{self, build_key};
use crate::services::counter_store::CounterStoreClient;
use crate::services::metrics::{classification_tags, decision_tags, MetricsSink, UNKNOWN_LABEL};
use crate::services::provider::LimitProvider;

/// The terminal outcome of running the pipeline for one request. The Actix
/// adapter renders [`PipelineDecision::Reject`] and
/// [`PipelineDecision::Blacklist`] into actual HTTP responses using the
/// configured [`ResponseSpec`]s; [`PipelineDecision::Passthrough`] means
/// "call the wrapped service".
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineDecision {
    Passthrough,
    Reject {
        applied_spec_display: String,
        retry_after_seconds: u64,
    },
    Blacklist,
}

/// Everything the pipeline needs for the lifetime of the process. Built
/// once at startup from [`crate::config::settings::MiddlewareSettings`] and
/// the indexed [`RuleIndex`]; shared (via `Arc`) across every request.
pub struct PipelineConfig {
    pub rules: Arc<RuleIndex>,
    pub provider: Arc<dyn LimitProvider>,
    pub counter: Arc<dyn CounterStoreClient>,
    pub metrics: Arc<dyn MetricsSink>,
    pub reject_response: ResponseSpec,
    pub blacklist_response: ResponseSpec,
    pub service_type: String,
    pub cadf_service_name: Option<String>,
    pub scope_source: ScopeSource,
    pub clock_accuracy: u64,
    pub max_sleep_time_seconds: f64,
    pub log_sleep_time_seconds: f64,
}

/// Runs the full pipeline for one request's attribute map. `now_ticks` is
/// the caller's current time in [`PipelineConfig::clock_accuracy`] ticks —
/// passed in rather than read internally so the admission engine's
/// behavior stays deterministic and testable.
pub async fn run(config: &PipelineConfig, attrs: &RequestAttributes, now_ticks: u64) -> PipelineDecision {
    let cadf_service_name = config.cadf_service_name.as_deref();
    let service_name = cadf_service_name.unwrap_or(UNKNOWN_LABEL);

    let Some(mut classification) = extract_classification(&attrs.0, config.scope_source, cadf_service_name) else {
        debug!("request classification incomplete, passing through without rate limiting");
        let tags = classification_tags(&config.service_type, service_name);
        config.metrics.increment("requests_unknown_classification", &tags).await;
        return PipelineDecision::Passthrough;
    };

    let action_group = config.rules.group_for_action(&classification.action).map(str::to_string);
    if let Some(group) = &action_group {
        classification.action = group.clone();
    }

    let tags = decision_tags(
        &config.service_type,
        service_name,
        config.scope_source.label(),
        &classification.scope,
        &classification.action,
        &classification.target_type_uri,
        action_group.as_deref(),
    );

    if is_whitelisted(&config.rules, &classification) {
        debug!(
            "scope {} (key: {:?}) is whitelisted, skipping rate limit",
            classification.scope, classification.scope_name_key
        );
        config.metrics.increment("requests_whitelisted_total", &tags).await;
        return PipelineDecision::Passthrough;
    }

    if is_blacklisted(&config.rules, &classification) {
        debug!(
            "scope {} (key: {:?}) is blacklisted, returning blacklist response",
            classification.scope, classification.scope_name_key
        );
        config.metrics.increment("requests_blacklisted_total", &tags).await;
        return PipelineDecision::Blacklist;
    }

    if let Some(decision) = check_global_limit(config, &classification, now_ticks, &tags).await {
        return decision;
    }

    if let Some(decision) = check_local_limit(config, &classification, now_ticks, &tags).await {
        return decision;
    }

    PipelineDecision::Passthrough
}

fn is_whitelisted(rules: &RuleIndex, classification: &RequestClassification) -> bool {
    rules.is_whitelisted(&classification.scope)
        || classification
            .scope_name_key
            .as_deref()
            .is_some_and(|key| rules.is_whitelisted(key))
}

fn is_blacklisted(rules: &RuleIndex, classification: &RequestClassification) -> bool {
    rules.is_blacklisted(&classification.scope)
        || classification
            .scope_name_key
            .as_deref()
            .is_some_and(|key| rules.is_blacklisted(key))
}

async fn check_global_limit(
    config: &PipelineConfig,
    classification: &RequestClassification,
    now_ticks: u64,
    tags: &[(String, String)],
) -> Option<PipelineDecision> {
    let limit = config
        .provider
        .global_limit(&classification.action, &classification.target_type_uri);
    if limit.is_unlimited() {
        return None;
    }

    let key = build_key("global", &classification.action, &classification.target_type_uri);
    resolve_admission(config, classification, &key, limit, now_ticks, "requests_global_ratelimit_total", tags).await
}

async fn check_local_limit(
    config: &PipelineConfig,
    classification: &RequestClassification,
    now_ticks: u64,
    tags: &[(String, String)],
) -> Option<PipelineDecision> {
    let limit = config
        .provider
        .local_limit(
            &classification.scope,
            &classification.action,
            &classification.target_type_uri,
            classification.domain_id.as_deref(),
        )
        .await;
    if limit.is_unlimited() {
        return None;
    }

    let key = build_key(&classification.scope, &classification.action, &classification.target_type_uri);
    resolve_admission(config, classification, &key, limit, now_ticks, "requests_local_ratelimit_total", tags).await
}

#[allow(clippy::too_many_arguments)]
async fn resolve_admission(
    config: &PipelineConfig,
    classification: &RequestClassification,
    key: &str,
    limit: crate::models::rate_spec::Limit,
    now_ticks: u64,
    reject_metric: &str,
    tags: &[(String, String)],
) -> Option<PipelineDecision> {
    use crate::models::decision::RateLimitDecision;

    let decision = admission::check(
        config.counter.as_ref(),
        key,
        limit,
        now_ticks,
        config.clock_accuracy,
        config.max_sleep_time_seconds,
    )
    .await;

    match decision {
        RateLimitDecision::Admit => None,
        RateLimitDecision::AdmitAfterSleep { seconds } => {
            if seconds >= config.log_sleep_time_seconds {
                info!("suspending request for {seconds:.3}s on key {key} (scope {})", classification.scope);
            } else {
                debug!("suspending request for {seconds:.3}s on key {key}");
            }
            tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
            None
        }
        RateLimitDecision::Reject {
            retry_after_seconds,
            applied_spec,
        } => {
            config.metrics.increment(reject_metric, tags).await;
            Some(PipelineDecision::Reject {
                applied_spec_display: applied_spec.to_string(),
                retry_after_seconds,
            })
        }
        RateLimitDecision::Blacklist => unreachable!("admission::check never returns Blacklist"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classification::{ATTR_ACTION, ATTR_INITIATOR_PROJECT_ID, ATTR_TARGET_TYPE_URI};
    use crate::models::rate_spec::Limit;
    use crate::models::rules::{ActionLimit, RuleIndex};
    use crate::services::counter_store::Admission;
    use crate::services::metrics::NullMetricsSink;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct CountingStore {
        calls: Mutex<Vec<String>>,
        admit: AtomicU64,
    }

    #[async_trait]
    impl CounterStoreClient for CountingStore {
        async fn check_and_record(
            &self,
            key: &str,
            _now_ticks: u64,
            _window_ticks: u64,
            max_count: u64,
            _max_sleep_ticks: u64,
        ) -> Result<Admission, crate::models::error::RateLimitError> {
            self.calls.lock().unwrap().push(key.to_string());
            let count = self.admit.fetch_add(1, Ordering::SeqCst);
            if count < max_count {
                Ok(Admission::Admitted)
            } else {
                Ok(Admission::Rejected { retry_after_ticks: 5000 })
            }
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    struct FixedProvider {
        local: Limit,
        global: Limit,
    }

    #[async_trait]
    impl LimitProvider for FixedProvider {
        fn global_limit(&self, _action: &str, _target_type_uri: &str) -> Limit {
            self.global
        }

        async fn local_limit(&self, _scope: &str, _action: &str, _target_type_uri: &str, _domain_id: Option<&str>) -> Limit {
            self.local
        }
    }

    fn attrs(scope: &str, action: &str, target: &str) -> RequestAttributes {
        let mut m = HashMap::new();
        m.insert(ATTR_ACTION.to_string(), action.to_string());
        m.insert(ATTR_TARGET_TYPE_URI.to_string(), target.to_string());
        m.insert(ATTR_INITIATOR_PROJECT_ID.to_string(), scope.to_string());
        RequestAttributes(m)
    }

    fn base_config(rules: RuleIndex, provider: FixedProvider, store: CountingStore) -> PipelineConfig {
        PipelineConfig {
            rules: Arc::new(rules),
            provider: Arc::new(provider),
            counter: Arc::new(store),
            metrics: Arc::new(NullMetricsSink),
            reject_response: ResponseSpec::default_reject(),
            blacklist_response: ResponseSpec::default_blacklist(),
            service_type: "object-store".to_string(),
            cadf_service_name: None,
            scope_source: ScopeSource::InitiatorProject,
            clock_accuracy: 1000,
            max_sleep_time_seconds: 20.0,
            log_sleep_time_seconds: 10.0,
        }
    }

    #[tokio::test]
    async fn missing_classification_passes_through_without_store_interaction() {
        let store = CountingStore {
            calls: Mutex::new(Vec::new()),
            admit: AtomicU64::new(0),
        };
        let config = base_config(
            RuleIndex::default(),
            FixedProvider { local: Limit::Unlimited, global: Limit::Unlimited },
            store,
        );
        let decision = run(&config, &RequestAttributes::default(), 0).await;
        assert_eq!(decision, PipelineDecision::Passthrough);
        assert!(config.counter.is_available().await);
    }

    #[tokio::test]
    async fn whitelist_short_circuits_before_any_limit_check() {
        let mut rules = RuleIndex::default();
        rules.whitelist.insert("scope-1".to_string());
        let store = CountingStore {
            calls: Mutex::new(Vec::new()),
            admit: AtomicU64::new(0),
        };
        let config = base_config(
            rules,
            FixedProvider {
                local: Limit::Spec(crate::models::rate_spec::RateSpec {
                    max_count: 1,
                    window_value: 1,
                    window_unit: crate::models::rate_spec::TimeUnit::Minute,
                }),
                global: Limit::Unlimited,
            },
            store,
        );
        let decision = run(&config, &attrs("scope-1", "update", "account/container"), 0).await;
        assert_eq!(decision, PipelineDecision::Passthrough);
    }

    #[tokio::test]
    async fn blacklist_wins_over_configured_limits() {
        let mut rules = RuleIndex::default();
        rules.blacklist.insert("scope-2".to_string());
        let store = CountingStore {
            calls: Mutex::new(Vec::new()),
            admit: AtomicU64::new(0),
        };
        let config = base_config(
            rules,
            FixedProvider { local: Limit::Unlimited, global: Limit::Unlimited },
            store,
        );
        let decision = run(&config, &attrs("scope-2", "update", "account/container"), 0).await;
        assert_eq!(decision, PipelineDecision::Blacklist);
    }

    #[tokio::test]
    async fn whitelist_takes_precedence_when_scope_is_in_both_lists() {
        let mut rules = RuleIndex::default();
        rules.whitelist.insert("scope-3".to_string());
        rules.blacklist.insert("scope-3".to_string());
        let store = CountingStore {
            calls: Mutex::new(Vec::new()),
            admit: AtomicU64::new(0),
        };
        let config = base_config(
            rules,
            FixedProvider { local: Limit::Unlimited, global: Limit::Unlimited },
            store,
        );
        let decision = run(&config, &attrs("scope-3", "update", "account/container"), 0).await;
        assert_eq!(decision, PipelineDecision::Passthrough);
    }

    #[tokio::test]
    async fn third_call_trips_the_local_limit() {
        let rules = RuleIndex {
            local_rules: HashMap::from([(
                "account/container".to_string(),
                vec![ActionLimit {
                    action: "update".to_string(),
                    limit: "2r/m".to_string(),
                }],
            )]),
            ..Default::default()
        };
        let store = CountingStore {
            calls: Mutex::new(Vec::new()),
            admit: AtomicU64::new(0),
        };
        let config = base_config(
            rules,
            FixedProvider {
                local: crate::models::rate_spec::parse_rate_spec("2r/m"),
                global: Limit::Unlimited,
            },
            store,
        );

        assert_eq!(
            run(&config, &attrs("scope-4", "update", "account/container"), 0).await,
            PipelineDecision::Passthrough
        );
        assert_eq!(
            run(&config, &attrs("scope-4", "update", "account/container"), 1000).await,
            PipelineDecision::Passthrough
        );
        let third = run(&config, &attrs("scope-4", "update", "account/container"), 2000).await;
        assert!(matches!(third, PipelineDecision::Reject { .. }));
    }

    struct RecordingMetricsSink {
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl MetricsSink for RecordingMetricsSink {
        async fn increment(&self, metric: &str, tags: &[(String, String)]) {
            self.calls.lock().unwrap().push((metric.to_string(), tags.to_vec()));
        }
    }

    #[tokio::test]
    async fn reject_metric_carries_scope_target_and_action_group_tags() {
        let rules = RuleIndex {
            local_rules: HashMap::from([(
                "account/container".to_string(),
                vec![ActionLimit {
                    action: "write".to_string(),
                    limit: "1r/m".to_string(),
                }],
            )]),
            action_groups: HashMap::from([(
                "write".to_string(),
                ["update", "delete"].into_iter().map(String::from).collect(),
            )]),
            ..Default::default()
        };
        let store = CountingStore {
            calls: Mutex::new(Vec::new()),
            admit: AtomicU64::new(0),
        };
        let metrics = Arc::new(RecordingMetricsSink {
            calls: Mutex::new(Vec::new()),
        });
        let mut config = base_config(
            rules,
            FixedProvider {
                local: crate::models::rate_spec::parse_rate_spec("1r/m"),
                global: Limit::Unlimited,
            },
            store,
        );
        config.metrics = metrics.clone();
        config.cadf_service_name = Some("service/storage/object".to_string());

        assert_eq!(
            run(&config, &attrs("scope-7", "update", "account/container"), 0).await,
            PipelineDecision::Passthrough
        );
        let rejected = run(&config, &attrs("scope-7", "delete", "account/container"), 0).await;
        assert!(matches!(rejected, PipelineDecision::Reject { .. }));

        let calls = metrics.calls.lock().unwrap();
        let (metric, tags) = calls.iter().find(|(m, _)| m == "requests_local_ratelimit_total").unwrap();
        assert_eq!(metric, "requests_local_ratelimit_total");
        assert!(tags.contains(&("service".to_string(), "object-store".to_string())));
        assert!(tags.contains(&("service_name".to_string(), "service/storage/object".to_string())));
        assert!(tags.contains(&("action".to_string(), "write".to_string())));
        assert!(tags.contains(&("initiator_project_id".to_string(), "scope-7".to_string())));
        assert!(tags.contains(&("target_type_uri".to_string(), "account/container".to_string())));
        assert!(tags.contains(&("action_group".to_string(), "write".to_string())));
    }
}
