use std::sync::Arc;

use actix_web::{App, HttpServer};
use log::info;

use rategate::config::document::{build_blacklist_response, build_reject_response, build_rule_index};
use rategate::config::settings::{load_config_document, MiddlewareSettings};
use rategate::logs::logger::configure_logger;
use rategate::middleware::rate_limit::RateLimit;
use rategate::routes::backend::configure_backend;
use rategate::routes::health::configure_health;
use rategate::services::counter_store::RedisCounterStore;
use rategate::services::identity::StaticIdentityClient;
use rategate::services::metrics::StatsdMetricsSink;
use rategate::services::pipeline::PipelineConfig;
use rategate::services::provider::LimitProvider;
use rategate::services::quota_provider::RemoteRateLimitProvider;
use rategate::services::static_provider::StaticRateLimitProvider;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = MiddlewareSettings::from_env();
    let doc = load_config_document(settings.config_file.as_deref());
    let rules = Arc::new(build_rule_index(&doc));

    let counter = Arc::new(RedisCounterStore::connect(&settings.backend_redis_url()).unwrap_or_else(|err| {
        panic!("cannot build counter store client for {}: {err}", settings.backend_redis_url());
    }));

    let provider: Arc<dyn LimitProvider> = if settings.limes_enabled {
        let identity = Arc::new(StaticIdentityClient::new(
            settings.password.clone().unwrap_or_default(),
            settings.limes_api_uri.clone().unwrap_or_default(),
        ));
        Arc::new(RemoteRateLimitProvider::new(
            settings.service_type.clone().unwrap_or_default(),
            identity,
            counter.clone(),
            settings.limes_refresh_interval_seconds,
        ))
    } else {
        Arc::new(StaticRateLimitProvider::new(rules.clone()))
    };

    let metrics = StatsdMetricsSink::from_env().await;

    let pipeline_config = PipelineConfig {
        rules,
        provider,
        counter,
        metrics: metrics.into(),
        reject_response: build_reject_response(&doc),
        blacklist_response: build_blacklist_response(&doc),
        service_type: settings.service_type.clone().unwrap_or_default(),
        cadf_service_name: settings.cadf_service_name.clone(),
        scope_source: settings.rate_limit_by,
        clock_accuracy: settings.clock_accuracy,
        max_sleep_time_seconds: settings.max_sleep_time_seconds,
        log_sleep_time_seconds: settings.log_sleep_time_seconds,
    };

    let host = std::env::var("RATEGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("RATEGATE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5900);

    info!("rategate listening on {host}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new(clone_pipeline_config(&pipeline_config)))
            .configure(configure_health)
            .configure(configure_backend)
    })
    .bind((host, port))?
    .run()
    .await
}

/// `PipelineConfig` holds `Arc`s throughout, so building a fresh copy per
/// worker is cheap — each field is either an `Arc` clone or a `Copy`/small
/// value, never a reallocation of the underlying rule index or connection
/// pool.
fn clone_pipeline_config(config: &PipelineConfig) -> PipelineConfig {
    PipelineConfig {
        rules: config.rules.clone(),
        provider: config.provider.clone(),
        counter: config.counter.clone(),
        metrics: config.metrics.clone(),
        reject_response: config.reject_response.clone(),
        blacklist_response: config.blacklist_response.clone(),
        service_type: config.service_type.clone(),
        cadf_service_name: config.cadf_service_name.clone(),
        scope_source: config.scope_source,
        clock_accuracy: config.clock_accuracy,
        max_sleep_time_seconds: config.max_sleep_time_seconds,
        log_sleep_time_seconds: config.log_sleep_time_seconds,
    }
}
