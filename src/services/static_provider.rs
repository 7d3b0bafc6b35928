//! The configuration-backed limit provider.
//!
//! Grounded on `rate_limit/provider.py::ConfigurationRateLimitProvider`: all
//! limits come from the YAML rule index built at startup, with no runtime
//! lookups.

use std::sync::Arc;

use crate::models::rate_spec::{parse_rate_spec, Limit};
use crate::models::rules::RuleIndex;

/// Resolves a limit string for (action, target_type_uri) from the static
/// rule index, parsing it on first use and caching nothing further — the
/// rule index itself is the cache (built once, immutable).
pub struct StaticRateLimitProvider {
    rules: Arc<RuleIndex>,
}

impl StaticRateLimitProvider {
    pub fn new(rules: Arc<RuleIndex>) -> Self {
        StaticRateLimitProvider { rules }
    }

    pub fn global_limit(&self, action: &str, target_type_uri: &str) -> Limit {
        match self.rules.global_limit(action, target_type_uri) {
            Some(raw) => parse_rate_spec(raw),
            None => Limit::Unlimited,
        }
    }

    pub fn local_limit(&self, action: &str, target_type_uri: &str) -> Limit {
        match self.rules.local_limit(action, target_type_uri) {
            Some(raw) => parse_rate_spec(raw),
            None => Limit::Unlimited,
        }
    }

    pub fn rules(&self) -> &RuleIndex {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rules::ActionLimit;
    use std::collections::HashMap;

    #[test]
    fn unconfigured_action_target_is_unlimited() {
        let rules = Arc::new(RuleIndex::default());
        let provider = StaticRateLimitProvider::new(rules);
        assert_eq!(provider.global_limit("update", "account/container"), Limit::Unlimited);
    }

    #[test]
    fn configured_action_target_parses_through() {
        let mut global_rules = HashMap::new();
        global_rules.insert(
            "account/container".to_string(),
            vec![ActionLimit {
                action: "update".to_string(),
                limit: "5r/m".to_string(),
            }],
        );
        let rules = Arc::new(RuleIndex {
            global_rules,
            ..Default::default()
        });
        let provider = StaticRateLimitProvider::new(rules);
        assert!(matches!(
            provider.global_limit("update", "account/container"),
            Limit::Spec(_)
        ));
    }
}
