//! Metric emission for rate-limit decisions.
//!
//! The original middleware batches StatsD packets per request via
//! `metricsClient.open_buffer()`/`close_buffer()`, tagging every increment
//! with a fixed label set (`rate_limit.py`'s `metric_labels`: `service`,
//! `service_name`, `action`, `<rate_limit_by>:<scope>`,
//! `target_type_uri`, and `action_group` when the action was collapsed into
//! a group). No StatsD client crate is part of this codebase's dependency
//! stack, so this module speaks the DogStatsd wire dialect directly over a
//! UDP socket: `<prefix>.<metric>:1|c|#tag1:value1,tag2:value2`.

use std::env;
use std::net::SocketAddr;

use log::debug;
use tokio::net::UdpSocket;

/// Emits a named counter increment carrying an arbitrary tag set. The tag
/// set is what lets a single metric name (e.g. `requests_local_ratelimit_total`)
/// be sliced by service, scope, action, and target type URI downstream.
#[async_trait::async_trait]
pub trait MetricsSink: Send + Sync {
    async fn increment(&self, metric: &str, tags: &[(String, String)]);
}

/// Discards every metric. Used when no `STATSD_HOST` is configured.
pub struct NullMetricsSink;

#[async_trait::async_trait]
impl MetricsSink for NullMetricsSink {
    async fn increment(&self, _metric: &str, _tags: &[(String, String)]) {}
}

/// Sends StatsD counter increments over UDP, fire-and-forget.
pub struct StatsdMetricsSink {
    socket: UdpSocket,
    target: SocketAddr,
    prefix: String,
}

impl StatsdMetricsSink {
    pub async fn connect(host: &str, port: u16, prefix: impl Into<String>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let target: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Ok(StatsdMetricsSink {
            socket,
            target,
            prefix: prefix.into(),
        })
    }

    /// Builds a sink from `STATSD_HOST` / `STATSD_PORT` / `STATSD_PREFIX`
    /// environment variables, falling back to a no-op sink if `STATSD_HOST`
    /// is unset — metrics are an ambient concern, not a required one.
    pub async fn from_env() -> Box<dyn MetricsSink> {
        let Ok(host) = env::var("STATSD_HOST") else {
            return Box::new(NullMetricsSink);
        };
        let port: u16 = env::var("STATSD_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8125);
        let prefix = env::var("STATSD_PREFIX").unwrap_or_else(|_| "rate_limit".to_string());

        match StatsdMetricsSink::connect(&host, port, prefix).await {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                debug!("failed to bind statsd socket, metrics disabled: {err}");
                Box::new(NullMetricsSink)
            }
        }
    }
}

#[async_trait::async_trait]
impl MetricsSink for StatsdMetricsSink {
    async fn increment(&self, metric: &str, tags: &[(String, String)]) {
        let mut packet = format!("{}.{}:1|c", self.prefix, metric);
        if !tags.is_empty() {
            packet.push_str("|#");
            for (i, (key, value)) in tags.iter().enumerate() {
                if i > 0 {
                    packet.push(',');
                }
                packet.push_str(key);
                packet.push(':');
                packet.push_str(value);
            }
        }
        if let Err(err) = self.socket.send_to(packet.as_bytes(), self.target).await {
            debug!("failed to send metric {metric}: {err}");
        }
    }
}

/// The sentinel placeholder for a label whose real value isn't known,
/// matching the classification module's `"unknown"` convention.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Tags attached to `requests_unknown_classification`: classification
/// failed before scope/action/target_type_uri could be determined, so only
/// `service` and `service_name` are known (spec.md §4.7 step 1).
pub fn classification_tags(service_type: &str, service_name: &str) -> Vec<(String, String)> {
    vec![
        ("service".to_string(), service_type.to_string()),
        ("service_name".to_string(), service_name.to_string()),
    ]
}

/// Tags attached to every metric emitted once a request has been
/// classified: `service`, `service_name`, `action`, `<scope_label>:<scope>`,
/// `target_type_uri`, and `action_group` when the action was collapsed into
/// a group. Mirrors `rate_limit.py::_rate_limit`'s `metric_labels` list.
#[allow(clippy::too_many_arguments)]
pub fn decision_tags(
    service_type: &str,
    service_name: &str,
    scope_label: &str,
    scope: &str,
    action: &str,
    target_type_uri: &str,
    action_group: Option<&str>,
) -> Vec<(String, String)> {
    let mut tags = vec![
        ("service".to_string(), service_type.to_string()),
        ("service_name".to_string(), service_name.to_string()),
        ("action".to_string(), action.to_string()),
        (scope_label.to_string(), scope.to_string()),
        ("target_type_uri".to_string(), target_type_uri.to_string()),
    ];
    if let Some(group) = action_group {
        tags.push(("action_group".to_string(), group.to_string()));
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_tags_carry_service_labels_only() {
        let tags = classification_tags("object-store", "service/storage/object");
        assert_eq!(
            tags,
            vec![
                ("service".to_string(), "object-store".to_string()),
                ("service_name".to_string(), "service/storage/object".to_string()),
            ]
        );
    }

    #[test]
    fn decision_tags_carry_scope_and_target() {
        let tags = decision_tags("object-store", "unknown", "initiator_project_id", "123456", "update", "account/container", None);
        assert!(tags.contains(&("service".to_string(), "object-store".to_string())));
        assert!(tags.contains(&("initiator_project_id".to_string(), "123456".to_string())));
        assert!(tags.contains(&("target_type_uri".to_string(), "account/container".to_string())));
        assert!(!tags.iter().any(|(k, _)| k == "action_group"));
    }

    #[test]
    fn decision_tags_include_action_group_when_present() {
        let tags = decision_tags("object-store", "unknown", "initiator_project_id", "123456", "write", "account/container", Some("write"));
        assert!(tags.contains(&("action_group".to_string(), "write".to_string())));
    }
}
