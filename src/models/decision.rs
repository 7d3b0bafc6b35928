//! The outcome of an admission check.

use crate::models::rate_spec::RateSpec;

/// What the admission engine decided for one (scope, action, target)
/// request against one [`RateSpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitDecision {
    /// The request is admitted immediately.
    Admit,
    /// The request is admitted after a bounded cooperative sleep of this
    /// many seconds (the reservation is already recorded in the counter
    /// store).
    AdmitAfterSleep { seconds: f64 },
    /// The request is rejected; retry after this many seconds. Carries the
    /// spec string that was applied, for the `X-RateLimit-Limit` header.
    Reject {
        retry_after_seconds: u64,
        applied_spec: RateSpec,
    },
    /// The scope is blacklisted; no counter-store interaction occurred.
    Blacklist,
}
