//! The YAML configuration document shape and its indexing into a
//! [`RuleIndex`] plus the two response specs.
//!
//! Grounded on `provider.py::ConfigurationRateLimitProvider.read_rate_limits_from_config`
//! (the `rates.global` / `rates.default` shape) and `rate_limit.py::_setup_response`
//! (custom response overrides, applied only when every field needed to build
//! one is present).

use std::collections::{HashMap, HashSet};

use actix_web::http::StatusCode;
use serde::Deserialize;

use crate::models::response::ResponseSpec;
use crate::models::rules::{ActionLimit, RuleIndex};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConfigDocument {
    pub rates: RatesSection,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub groups: HashMap<String, Vec<String>>,
    pub ratelimit_response: Option<ResponseConfig>,
    pub blacklist_response: Option<ResponseConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RatesSection {
    pub global: HashMap<String, Vec<ActionLimitEntry>>,
    pub default: HashMap<String, Vec<ActionLimitEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct ActionLimitEntry {
    pub action: String,
    pub limit: String,
}

/// A custom response override. Mirrors `response.py`'s
/// `response_parameters_from_config`: exactly one of `body`/`json_body` may
/// be set, and a custom response only replaces the default when `status`,
/// `status_code` and a body of some kind are all present.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ResponseConfig {
    pub status: Option<String>,
    pub status_code: Option<u16>,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub json_body: Option<serde_json::Value>,
}

/// Defaults baked into the middleware before any configuration file is
/// consulted, per `rate_limit.py.__init__`: localhost is never rate
/// limited even with an empty configuration.
const DEFAULT_WHITELIST: &[&str] = &["127.0.0.1", "localhost"];

/// Builds the immutable [`RuleIndex`] from a parsed configuration
/// document. Always succeeds — a configuration document with no
/// recognized keys indexes to an effectively empty rule set (spec.md §7
/// error kind 2: invalid/absent configuration runs with empty rules, not a
/// startup failure).
pub fn build_rule_index(doc: &ConfigDocument) -> RuleIndex {
    RuleIndex {
        global_rules: index_section(&doc.rates.global),
        local_rules: index_section(&doc.rates.default),
        whitelist: DEFAULT_WHITELIST
            .iter()
            .map(|s| s.to_string())
            .chain(doc.whitelist.iter().cloned())
            .collect::<HashSet<_>>(),
        blacklist: doc.blacklist.iter().cloned().collect(),
        action_groups: doc
            .groups
            .iter()
            .map(|(group, members)| (group.clone(), members.iter().cloned().collect()))
            .collect(),
    }
}

fn index_section(section: &HashMap<String, Vec<ActionLimitEntry>>) -> HashMap<String, Vec<ActionLimit>> {
    section
        .iter()
        .map(|(target, entries)| {
            let limits = entries
                .iter()
                .map(|e| ActionLimit {
                    action: e.action.clone(),
                    limit: e.limit.clone(),
                })
                .collect();
            (target.clone(), limits)
        })
        .collect()
}

/// Builds the reject response spec, falling back to the default 429 JSON
/// body when no override is configured or the override is incomplete.
pub fn build_reject_response(doc: &ConfigDocument) -> ResponseSpec {
    build_response(doc.ratelimit_response.as_ref(), ResponseSpec::default_reject)
}

/// Builds the blacklist response spec, falling back to the default 497.
pub fn build_blacklist_response(doc: &ConfigDocument) -> ResponseSpec {
    build_response(doc.blacklist_response.as_ref(), ResponseSpec::default_blacklist)
}

fn build_response(config: Option<&ResponseConfig>, default: fn() -> ResponseSpec) -> ResponseSpec {
    let Some(config) = config else {
        return default();
    };

    let has_body = config.body.is_some() || config.json_body.is_some();
    let Some(status_code) = config.status_code else {
        return default();
    };
    if !has_body {
        return default();
    }
    let Some(status) = StatusCode::from_u16(status_code).ok() else {
        return default();
    };

    ResponseSpec {
        status_code: status,
        headers: config.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        body: config.body.clone(),
        json_body: config.json_body.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_still_whitelists_localhost() {
        let doc = ConfigDocument::default();
        let index = build_rule_index(&doc);
        assert!(index.is_whitelisted("127.0.0.1"));
        assert!(index.is_whitelisted("localhost"));
        assert!(index.global_rules.is_empty());
    }

    #[test]
    fn parses_full_yaml_document() {
        let yaml = r#"
rates:
  global:
    account/container:
      - action: update
        limit: 10r/s
  default:
    account/container:
      - action: update
        limit: 2r/m
whitelist:
  - 1233456789abcdef
blacklist:
  - abcdef1233456789
groups:
  write:
    - update
    - delete
"#;
        let doc: ConfigDocument = serde_yaml::from_str(yaml).unwrap();
        let index = build_rule_index(&doc);
        assert_eq!(index.global_limit("update", "account/container"), Some("10r/s"));
        assert_eq!(index.local_limit("update", "account/container"), Some("2r/m"));
        assert!(index.is_whitelisted("1233456789abcdef"));
        assert!(index.is_blacklisted("abcdef1233456789"));
        assert_eq!(index.group_for_action("delete"), Some("write"));
    }

    #[test]
    fn incomplete_response_override_falls_back_to_default() {
        let yaml = r#"
ratelimit_response:
  status_code: 498
"#;
        let doc: ConfigDocument = serde_yaml::from_str(yaml).unwrap();
        let spec = build_reject_response(&doc);
        assert_eq!(spec.status_code, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn complete_response_override_replaces_default() {
        let yaml = r#"
ratelimit_response:
  status: "498 Over Quota"
  status_code: 498
  json_body:
    error: over quota
"#;
        let doc: ConfigDocument = serde_yaml::from_str(yaml).unwrap();
        let spec = build_reject_response(&doc);
        assert_eq!(spec.status_code.as_u16(), 498);
    }
}
