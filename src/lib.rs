//! # rategate
//!
//! A request-admission rate-limit middleware: given a request already
//! classified into `(scope, action, target_type_uri)`, decide whether to
//! admit it, suspend it briefly then admit, reject it with a retry-after,
//! or reject it as blacklisted — against per-rule sliding-window limits
//! enforced atomically in a shared Redis counter store, so that multiple
//! middleware instances agree on one global view.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rategate::config::document::{build_reject_response, build_blacklist_response, build_rule_index};
//! use rategate::config::settings::{load_config_document, MiddlewareSettings};
//! use rategate::services::counter_store::RedisCounterStore;
//! use rategate::services::metrics::NullMetricsSink;
//! use rategate::services::pipeline::PipelineConfig;
//! use rategate::services::provider::LimitProvider;
//! use rategate::services::static_provider::StaticRateLimitProvider;
//! use rategate::middleware::rate_limit::RateLimit;
//!
//! # fn build(settings: MiddlewareSettings) -> Result<(), Box<dyn std::error::Error>> {
//! let doc = load_config_document(settings.config_file.as_deref());
//! let rules = Arc::new(build_rule_index(&doc));
//! let counter = Arc::new(RedisCounterStore::connect(&settings.backend_redis_url())?);
//!
//! let config = PipelineConfig {
//!     reject_response: build_reject_response(&doc),
//!     blacklist_response: build_blacklist_response(&doc),
//!     provider: Arc::new(StaticRateLimitProvider::new(rules.clone())) as Arc<dyn LimitProvider>,
//!     rules,
//!     counter,
//!     metrics: Arc::new(NullMetricsSink),
//!     service_type: settings.service_type.unwrap_or_default(),
//!     cadf_service_name: settings.cadf_service_name,
//!     scope_source: settings.rate_limit_by,
//!     clock_accuracy: settings.clock_accuracy,
//!     max_sleep_time_seconds: settings.max_sleep_time_seconds,
//!     log_sleep_time_seconds: settings.log_sleep_time_seconds,
//! };
//!
//! let _middleware = RateLimit::new(config);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Components
//!
//! - **Rate spec parser** ([`models::rate_spec`]) — `"5r/m"`-style strings
//!   into `(max_count, window)`.
//! - **Counter store client** ([`services::counter_store`]) — an atomic
//!   sliding-window check-and-record against Redis.
//! - **Admission engine** ([`services::admission`]) — turns one
//!   counter-store round trip into a decision, fail-open on any error.
//! - **Limit providers** ([`services::static_provider`],
//!   [`services::quota_provider`]) — a stable [`services::provider::LimitProvider`]
//!   contract with a configuration-backed and a remote quota-service-backed
//!   implementation.
//! - **Response builder** ([`models::response`]) — configurable reject /
//!   blacklist HTTP responses with rate-limit headers.
//! - **Decision pipeline** ([`services::pipeline`]) — classify → action
//!   grouping → whitelist → blacklist → global limit → local limit,
//!   short-circuiting at the first terminal outcome.
//!
//! ## Module Organization
//!
//! - **[`config`]** — YAML rule document and WSGI-equivalent init options.
//! - **[`models`]** — data types: classification, decision, error, rate
//!   spec, response, rule index.
//! - **[`services`]** — the pipeline and its collaborators (counter store,
//!   providers, identity client, metrics sink).
//! - **[`middleware`]** — the Actix Web `Transform`/`Service` wiring around
//!   the pipeline.
//! - **[`routes`]** — the demo host's handlers (health checks and a
//!   passthrough backend), standing in for "the host's request-processing
//!   framework" this middleware is designed to sit in front of.
//! - **[`logs`]** — structured, colorized console logging setup.
//!
//! ## Environment Variables
//!
//! - `RATEGATE_CONFIG_PATH`: YAML rule document path (default `./config.yaml`).
//! - `RATEGATE_BACKEND_HOST` / `RATEGATE_BACKEND_PORT`: counter store address.
//! - `RATEGATE_SERVICE_TYPE`, `RATEGATE_CADF_SERVICE_NAME`, `RATEGATE_RATE_LIMIT_BY`,
//!   `RATEGATE_CLOCK_ACCURACY`, `RATEGATE_MAX_SLEEP_TIME_SECONDS`,
//!   `RATEGATE_LOG_SLEEP_TIME_SECONDS`: the WSGI-equivalent init options of
//!   spec §6.
//! - `RATEGATE_LIMES_ENABLED`, `RATEGATE_LIMES_API_URI`,
//!   `RATEGATE_LIMES_REFRESH_INTERVAL_SECONDS`, `RATEGATE_IDENTITY_AUTH_URL`,
//!   `RATEGATE_USERNAME`, `RATEGATE_PASSWORD`, `RATEGATE_USER_DOMAIN_NAME`,
//!   `RATEGATE_DOMAIN_NAME`: remote quota-service provider configuration.
//! - `STATSD_HOST` / `STATSD_PORT` / `STATSD_PREFIX`: metrics sink, disabled
//!   (no-op) when `STATSD_HOST` is unset.
//! - `RATEGATE_HOST` / `RATEGATE_PORT`: demo host bind address.
//! - `NO_COLOR`: disable colored log output.
//!
//! ## Non-goals
//!
//! No token-bucket or leaky-bucket variants, no distributed consensus
//! beyond what the counter store provides, no persistence of limits or
//! counters across store failure, no per-user quota accounting.

pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
