//! The indexed rule set built from the YAML configuration document.
//!
//! Grounded on `rate_limit/provider.py::ConfigurationRateLimitProvider` and
//! the group-collapsing logic in `rate_limit/rate_limit.py::get_action_from_rate_limit_groups`.

use std::collections::{HashMap, HashSet};

/// One `{action, limit}` entry as it appears under a target type URI in the
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionLimit {
    pub action: String,
    pub limit: String,
}

/// The fully indexed, immutable rule set for one middleware instance.
///
/// Built once at startup from the YAML document (spec.md §4.4) and never
/// mutated afterwards — configuration is immutable for the process
/// lifetime.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    pub global_rules: HashMap<String, Vec<ActionLimit>>,
    pub local_rules: HashMap<String, Vec<ActionLimit>>,
    pub whitelist: HashSet<String>,
    pub blacklist: HashSet<String>,
    pub action_groups: HashMap<String, HashSet<String>>,
}

impl RuleIndex {
    /// First-match-wins lookup of the global (unscoped) limit string for
    /// (action, target_type_uri).
    pub fn global_limit(&self, action: &str, target_type_uri: &str) -> Option<&str> {
        Self::lookup(&self.global_rules, action, target_type_uri)
    }

    /// First-match-wins lookup of the local (per-scope) limit string for
    /// (action, target_type_uri). Scope is deliberately not part of the
    /// lookup key — per-scope limits are uniform across scopes, only the
    /// counting is per-scope.
    pub fn local_limit(&self, action: &str, target_type_uri: &str) -> Option<&str> {
        Self::lookup(&self.local_rules, action, target_type_uri)
    }

    fn lookup<'a>(
        rules: &'a HashMap<String, Vec<ActionLimit>>,
        action: &str,
        target_type_uri: &str,
    ) -> Option<&'a str> {
        rules
            .get(target_type_uri)?
            .iter()
            .find(|rl| rl.action == action)
            .map(|rl| rl.limit.as_str())
    }

    /// Returns the group name if `action` belongs to one, else `None`. The
    /// pipeline substitutes this for the raw action before any limit lookup
    /// (spec.md §4.7 step 2).
    pub fn group_for_action(&self, action: &str) -> Option<&str> {
        self.action_groups
            .iter()
            .find(|(_, members)| members.contains(action))
            .map(|(group, _)| group.as_str())
    }

    pub fn is_whitelisted(&self, key: &str) -> bool {
        self.whitelist.contains(key)
    }

    pub fn is_blacklisted(&self, key: &str) -> bool {
        self.blacklist.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> RuleIndex {
        let mut local_rules = HashMap::new();
        local_rules.insert(
            "account/container".to_string(),
            vec![ActionLimit {
                action: "write".to_string(),
                limit: "1r/m".to_string(),
            }],
        );
        let mut action_groups = HashMap::new();
        action_groups.insert(
            "write".to_string(),
            ["update", "delete"].into_iter().map(String::from).collect(),
        );
        RuleIndex {
            local_rules,
            action_groups,
            ..Default::default()
        }
    }

    #[test]
    fn action_group_collapses_members() {
        let idx = sample_index();
        assert_eq!(idx.group_for_action("update"), Some("write"));
        assert_eq!(idx.group_for_action("delete"), Some("write"));
        assert_eq!(idx.group_for_action("read"), None);
    }

    #[test]
    fn first_match_wins_local_lookup() {
        let idx = sample_index();
        assert_eq!(idx.local_limit("write", "account/container"), Some("1r/m"));
        assert_eq!(idx.local_limit("read", "account/container"), None);
    }

    #[test]
    fn whitelist_precedence_over_blacklist() {
        let mut idx = RuleIndex::default();
        idx.whitelist.insert("scope-a".to_string());
        idx.blacklist.insert("scope-a".to_string());
        assert!(idx.is_whitelisted("scope-a"));
        assert!(idx.is_blacklisted("scope-a"));
        // precedence is enforced by the pipeline checking whitelist first;
        // this test documents that both sets may legally overlap.
    }
}
