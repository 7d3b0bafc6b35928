//! WSGI-equivalent init options and configuration file loading.
//!
//! Grounded on `rate_limit.py::OpenStackRateLimitMiddleware.__init__`, which
//! reads its `wsgi_config` dict for backend/timeout/scope/identity
//! parameters, and on this codebase's own `config::settings::load_settings`
//! for the file-loading security posture (path-traversal and size-limit
//! checks) — reapplied here to a YAML document instead of JSON.

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::config::document::ConfigDocument;
use crate::models::classification::ScopeSource;

const MAX_CONFIG_SIZE: u64 = 10 * 1024 * 1024;

/// Every WSGI-equivalent init option named in spec.md §6, collected from
/// environment variables with the same names lower-cased (e.g.
/// `RATEGATE_BACKEND_HOST`). Values not supplied fall back to the
/// original middleware's defaults.
#[derive(Debug, Clone)]
pub struct MiddlewareSettings {
    pub config_file: Option<String>,
    pub service_type: Option<String>,
    pub cadf_service_name: Option<String>,
    pub backend_host: String,
    pub backend_port: u16,
    pub backend_timeout_seconds: u64,
    pub backend_max_connections: u32,
    pub max_sleep_time_seconds: f64,
    pub log_sleep_time_seconds: f64,
    pub clock_accuracy: u64,
    pub rate_limit_by: ScopeSource,
    pub limes_enabled: bool,
    pub limes_api_uri: Option<String>,
    pub limes_refresh_interval_seconds: u64,
    pub identity_auth_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_domain_name: Option<String>,
    pub domain_name: Option<String>,
}

impl Default for MiddlewareSettings {
    fn default() -> Self {
        MiddlewareSettings {
            config_file: None,
            service_type: None,
            cadf_service_name: None,
            backend_host: "127.0.0.1".to_string(),
            backend_port: 6379,
            backend_timeout_seconds: 20,
            backend_max_connections: 100,
            max_sleep_time_seconds: 20.0,
            log_sleep_time_seconds: 10.0,
            clock_accuracy: 1000,
            rate_limit_by: ScopeSource::InitiatorProject,
            limes_enabled: false,
            limes_api_uri: None,
            limes_refresh_interval_seconds: 300,
            identity_auth_url: None,
            username: None,
            password: None,
            user_domain_name: None,
            domain_name: None,
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl MiddlewareSettings {
    /// Reads every init option from `RATEGATE_*` environment variables,
    /// falling back to the original middleware's defaults for anything
    /// unset. Mirrors `wsgi_config.get(key, default)` from the Python
    /// `__init__`.
    pub fn from_env() -> Self {
        let defaults = MiddlewareSettings::default();

        MiddlewareSettings {
            config_file: Some(env("RATEGATE_CONFIG_PATH").unwrap_or_else(|| "./config.yaml".to_string())),
            service_type: env("RATEGATE_SERVICE_TYPE"),
            cadf_service_name: env("RATEGATE_CADF_SERVICE_NAME"),
            backend_host: env("RATEGATE_BACKEND_HOST").unwrap_or(defaults.backend_host),
            backend_port: env_or("RATEGATE_BACKEND_PORT", defaults.backend_port),
            backend_timeout_seconds: env_or(
                "RATEGATE_BACKEND_TIMEOUT_SECONDS",
                defaults.backend_timeout_seconds,
            ),
            backend_max_connections: env_or(
                "RATEGATE_BACKEND_MAX_CONNECTIONS",
                defaults.backend_max_connections,
            ),
            max_sleep_time_seconds: env_or(
                "RATEGATE_MAX_SLEEP_TIME_SECONDS",
                defaults.max_sleep_time_seconds,
            ),
            log_sleep_time_seconds: env_or(
                "RATEGATE_LOG_SLEEP_TIME_SECONDS",
                defaults.log_sleep_time_seconds,
            ),
            clock_accuracy: env("RATEGATE_CLOCK_ACCURACY")
                .map(|v| parse_clock_accuracy(&v))
                .unwrap_or(defaults.clock_accuracy),
            rate_limit_by: env("RATEGATE_RATE_LIMIT_BY")
                .and_then(|v| parse_scope_source(&v))
                .unwrap_or(defaults.rate_limit_by),
            limes_enabled: env_or("RATEGATE_LIMES_ENABLED", defaults.limes_enabled),
            limes_api_uri: env("RATEGATE_LIMES_API_URI"),
            limes_refresh_interval_seconds: env_or(
                "RATEGATE_LIMES_REFRESH_INTERVAL_SECONDS",
                defaults.limes_refresh_interval_seconds,
            ),
            identity_auth_url: env("RATEGATE_IDENTITY_AUTH_URL"),
            username: env("RATEGATE_USERNAME"),
            password: env("RATEGATE_PASSWORD"),
            user_domain_name: env("RATEGATE_USER_DOMAIN_NAME"),
            domain_name: env("RATEGATE_DOMAIN_NAME"),
        }
    }

    pub fn backend_redis_url(&self) -> String {
        format!("redis://{}:{}", self.backend_host, self.backend_port)
    }
}

fn parse_scope_source(raw: &str) -> Option<ScopeSource> {
    match raw {
        "initiator_project_id" => Some(ScopeSource::InitiatorProject),
        "target_project_id" => Some(ScopeSource::TargetProject),
        "initiator_host_address" => Some(ScopeSource::InitiatorHost),
        _ => None,
    }
}

/// Parses a clock-accuracy spec like `"1ms"` into ticks per second. Any
/// failure falls back to 1000 (millisecond ticks), matching the crate-wide
/// policy of never propagating a parse error out of a configuration
/// boundary.
fn parse_clock_accuracy(raw: &str) -> u64 {
    let raw = raw.trim();
    let split_at = raw.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(raw.len());
    let (value_str, unit) = raw.split_at(split_at);
    let value: f64 = if value_str.is_empty() { 1.0 } else { value_str.parse().unwrap_or(1.0) };

    let factor_seconds = match unit {
        "ns" => 1e-9,
        "ms" => 1e-3,
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        "d" => 86400.0,
        _ => return 1000,
    };

    let seconds = value * factor_seconds;
    if seconds <= 0.0 {
        return 1000;
    }
    (1.0 / seconds).round().max(1.0) as u64
}

/// Reads and parses the YAML configuration document named by
/// `config_file`, applying the same path-traversal and size-limit
/// protections as this codebase's JSON settings loader. Returns the empty
/// document (no rules, default responses) when `config_file` is unset or
/// loading fails — per spec.md §7 error kind 2, a broken configuration
/// runs with empty rules rather than failing startup.
pub fn load_config_document(config_file: Option<&str>) -> ConfigDocument {
    let Some(config_file) = config_file else {
        debug!("no RATEGATE_CONFIG_FILE configured, running with empty rate limit rules");
        return ConfigDocument::default();
    };

    match read_and_parse(config_file) {
        Ok(doc) => doc,
        Err(err) => {
            warn!("error loading configuration from '{config_file}': {err}. running with empty rules");
            ConfigDocument::default()
        }
    }
}

fn read_and_parse(config_file: &str) -> Result<ConfigDocument, String> {
    let path = Path::new(config_file);
    if !path.exists() {
        return Err(format!("cannot resolve config path '{config_file}'"));
    }

    let canonical_path = path
        .canonicalize()
        .map_err(|e| format!("cannot resolve config path '{config_file}': {e}"))?;

    let current_dir = std::env::current_dir().map_err(|e| format!("cannot get current directory: {e}"))?;
    if !canonical_path.starts_with(&current_dir) {
        return Err("config path outside working directory".to_string());
    }

    let metadata = fs::metadata(&canonical_path).map_err(|e| format!("cannot read config file metadata: {e}"))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(format!(
            "config file too large: {} bytes (max: {} bytes)",
            metadata.len(),
            MAX_CONFIG_SIZE
        ));
    }

    let content = fs::read_to_string(&canonical_path).map_err(|e| format!("cannot read config file: {e}"))?;
    serde_yaml::from_str(&content).map_err(|e| format!("invalid YAML: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_accuracy_defaults_to_milliseconds() {
        assert_eq!(parse_clock_accuracy("1ms"), 1000);
        assert_eq!(parse_clock_accuracy("1s"), 1);
        assert_eq!(parse_clock_accuracy("garbage"), 1000);
    }

    #[test]
    fn missing_config_file_yields_empty_document() {
        let doc = load_config_document(None);
        assert!(doc.rates.global.is_empty());
        assert!(doc.rates.default.is_empty());
    }

    #[test]
    fn nonexistent_config_file_falls_back_to_empty_document() {
        let doc = load_config_document(Some("/nonexistent/path/to/config.yaml"));
        assert!(doc.rates.default.is_empty());
    }

    #[test]
    fn loads_real_yaml_file() {
        let dir = std::env::current_dir().unwrap();
        let file_path = dir.join("rategate_test_config.yaml");
        std::fs::write(
            &file_path,
            r#"
rates:
  default:
    account/container:
      - action: update
        limit: 2r/m
"#,
        )
        .unwrap();

        let doc = load_config_document(Some(file_path.to_str().unwrap()));
        assert_eq!(doc.rates.default["account/container"][0].limit, "2r/m");

        std::fs::remove_file(&file_path).ok();
    }
}
