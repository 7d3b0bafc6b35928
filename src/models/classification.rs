//! Extraction of (scope, action, target_type_uri) from the host's
//! request-environment attributes.
//!
//! Grounded on `rate_limit.py`'s `get_scope_action_target_type_uri_from_environ`,
//! `_get_scope_from_environ` and `_trim_cadf_service_prefix_from_target_type_uri`.
//! The attribute map stands in for a WSGI `environ` dict; this crate never
//! assumes a specific web framework produced it.

use std::collections::HashMap;

/// `WATCHER.*` attributes the host is expected to place in the request
/// environment.
pub const ATTR_ACTION: &str = "WATCHER.ACTION";
pub const ATTR_TARGET_TYPE_URI: &str = "WATCHER.TARGET_TYPE_URI";
pub const ATTR_SERVICE_TYPE: &str = "WATCHER.SERVICE_TYPE";
pub const ATTR_CADF_SERVICE_NAME: &str = "WATCHER.CADF_SERVICE_NAME";
pub const ATTR_INITIATOR_PROJECT_ID: &str = "WATCHER.INITIATOR_PROJECT_ID";
pub const ATTR_TARGET_PROJECT_ID: &str = "WATCHER.TARGET_PROJECT_ID";
pub const ATTR_INITIATOR_HOST_ADDRESS: &str = "WATCHER.INITIATOR_HOST_ADDRESS";
pub const ATTR_INITIATOR_PROJECT_DOMAIN_NAME: &str = "WATCHER.INITIATOR_PROJECT_DOMAIN_NAME";
pub const ATTR_INITIATOR_PROJECT_NAME: &str = "WATCHER.INITIATOR_PROJECT_NAME";
pub const ATTR_INITIATOR_DOMAIN_ID: &str = "WATCHER.INITIATOR_DOMAIN_ID";

/// Request-environment attributes as a host places them before invoking the
/// middleware. Stored as an Actix request extension; absent entirely if the
/// host never inserted one, which the pipeline treats the same as an empty
/// map (classification missing, passthrough).
#[derive(Debug, Clone, Default)]
pub struct RequestAttributes(pub HashMap<String, String>);

/// The sentinel value the host uses to mean "absent".
const UNKNOWN: &str = "unknown";

/// Which request attribute selects the counting scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSource {
    InitiatorProject,
    TargetProject,
    InitiatorHost,
}

impl ScopeSource {
    fn attribute_name(self) -> &'static str {
        match self {
            ScopeSource::InitiatorProject => ATTR_INITIATOR_PROJECT_ID,
            ScopeSource::TargetProject => ATTR_TARGET_PROJECT_ID,
            ScopeSource::InitiatorHost => ATTR_INITIATOR_HOST_ADDRESS,
        }
    }

    /// The metric tag name the scope value is reported under, matching
    /// `rate_limit.py`'s `'{0}:{1}'.format(self.rate_limit_by, scope)` and
    /// the `RATEGATE_RATE_LIMIT_BY` config values in `config::settings`.
    pub fn label(self) -> &'static str {
        match self {
            ScopeSource::InitiatorProject => "initiator_project_id",
            ScopeSource::TargetProject => "target_project_id",
            ScopeSource::InitiatorHost => "initiator_host_address",
        }
    }
}

/// The classified attributes of one request, ready for the decision
/// pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestClassification {
    pub scope: String,
    pub action: String,
    pub target_type_uri: String,
    /// `"<domain>/<project>"`, used as an additional whitelist/blacklist key.
    pub scope_name_key: Option<String>,
    /// Needed by the remote provider's domain-scoped quota lookup; absent
    /// when the host doesn't supply it (e.g. host-address scoping).
    pub domain_id: Option<String>,
}

fn is_present(value: Option<&String>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && v != UNKNOWN)
}

fn get_present<'a>(attrs: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
    attrs.get(key).filter(|v| !v.is_empty() && *v != UNKNOWN)
}

/// Extracts (scope, action, target_type_uri) from the request attributes.
///
/// Returns `None` if any of the three is missing or equals `"unknown"` —
/// the pipeline must then return a passthrough without touching the
/// counter store (spec.md §4.7 step 1).
pub fn extract_classification(
    attrs: &HashMap<String, String>,
    scope_source: ScopeSource,
    cadf_service_name: Option<&str>,
) -> Option<RequestClassification> {
    let action = get_present(attrs, ATTR_ACTION)?.clone();
    let raw_target_type_uri = get_present(attrs, ATTR_TARGET_TYPE_URI)?.clone();
    let scope = get_present(attrs, scope_source.attribute_name())?.clone();

    let target_type_uri = match cadf_service_name {
        Some(prefix) if !prefix.is_empty() => {
            trim_cadf_service_prefix(prefix, &raw_target_type_uri)
        }
        _ => raw_target_type_uri,
    };

    let scope_name_key = scope_name_key_from_attrs(attrs);
    let domain_id = get_present(attrs, ATTR_INITIATOR_DOMAIN_ID).cloned();

    debug_assert!(is_present(Some(&action)));

    Some(RequestClassification {
        scope,
        action,
        target_type_uri,
        scope_name_key,
        domain_id,
    })
}

/// Trims a CADF service-name prefix from a target type URI.
///
/// Example: prefix `service/storage/object`, target type URI
/// `service/storage/object/account/container/object` becomes
/// `account/container/object`. If the prefix is not found, the URI is
/// returned unchanged (mirrors the original's `lstrip`-and-log-warning
/// fallback).
pub fn trim_cadf_service_prefix(prefix: &str, target_type_uri: &str) -> String {
    match target_type_uri.split_once(prefix) {
        Some((before, after)) if before.is_empty() => after.trim_start_matches('/').to_string(),
        _ => target_type_uri.to_string(),
    }
}

fn scope_name_key_from_attrs(attrs: &HashMap<String, String>) -> Option<String> {
    let domain_name = get_present(attrs, ATTR_INITIATOR_PROJECT_DOMAIN_NAME)?;
    let project_name = get_present(attrs, ATTR_INITIATOR_PROJECT_NAME)?;
    Some(format!("{domain_name}/{project_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn scope_label_matches_config_key() {
        assert_eq!(ScopeSource::InitiatorProject.label(), "initiator_project_id");
        assert_eq!(ScopeSource::TargetProject.label(), "target_project_id");
        assert_eq!(ScopeSource::InitiatorHost.label(), "initiator_host_address");
    }

    #[test]
    fn missing_action_yields_none() {
        let a = attrs(&[(ATTR_TARGET_TYPE_URI, "x"), (ATTR_INITIATOR_PROJECT_ID, "p")]);
        assert!(extract_classification(&a, ScopeSource::InitiatorProject, None).is_none());
    }

    #[test]
    fn unknown_sentinel_treated_as_absent() {
        let a = attrs(&[
            (ATTR_ACTION, "unknown"),
            (ATTR_TARGET_TYPE_URI, "x"),
            (ATTR_INITIATOR_PROJECT_ID, "p"),
        ]);
        assert!(extract_classification(&a, ScopeSource::InitiatorProject, None).is_none());
    }

    #[test]
    fn trims_cadf_prefix() {
        let trimmed = trim_cadf_service_prefix(
            "service/storage/object",
            "service/storage/object/account/container/object",
        );
        assert_eq!(trimmed, "account/container/object");
    }

    #[test]
    fn full_classification_with_scope_name_key() {
        let a = attrs(&[
            (ATTR_ACTION, "update"),
            (ATTR_TARGET_TYPE_URI, "service/storage/object/account/container"),
            (ATTR_INITIATOR_PROJECT_ID, "123456"),
            (ATTR_INITIATOR_PROJECT_DOMAIN_NAME, "Default"),
            (ATTR_INITIATOR_PROJECT_NAME, "demo"),
        ]);
        let c = extract_classification(&a, ScopeSource::InitiatorProject, Some("service/storage/object"))
            .unwrap();
        assert_eq!(c.scope, "123456");
        assert_eq!(c.action, "update");
        assert_eq!(c.target_type_uri, "account/container");
        assert_eq!(c.scope_name_key.as_deref(), Some("Default/demo"));
    }
}
