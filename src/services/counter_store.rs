//! Sliding-window counter store backed by Redis.
//!
//! Grounded on `rate_limit/backend.py`'s `RedisBackend` and `strategy.py`'s
//! `SlidingWindowStrategy`, reworked into a single atomic Lua script so the
//! prune/check/record sequence can never race across concurrent requests
//! (the Python pipeline version is not atomic across its three calls; this
//! crate does not repeat that gap).

use std::sync::Arc;

use deadpool_redis::{redis::Script, Config, Pool, Runtime};
use log::{debug, warn};

use crate::models::error::RateLimitError;

/// The result of one admission check against the sliding window, expressed
/// in the same clock-accuracy ticks as the request's `window_ticks`. The
/// caller (which knows the configured clock accuracy) converts to seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Below the limit; the request was recorded.
    Admitted,
    /// At or above the limit, but admitting after `sleep_ticks` stays
    /// within `max_sleep`; the reservation was already recorded.
    AdmittedAfterSleep { sleep_ticks: u64 },
    /// At or above the limit and sleeping would exceed `max_sleep`; nothing
    /// was recorded. Retry after `retry_after_ticks`.
    Rejected { retry_after_ticks: u64 },
}

/// Atomically prunes entries older than the window, counts what remains,
/// and either records a new entry (admitting immediately or after a
/// bounded sleep) or rejects without recording.
///
/// KEYS[1] = counter key
/// ARGV[1] = now, integer ticks
/// ARGV[2] = window, integer ticks
/// ARGV[3] = max_count
/// ARGV[4] = max_sleep, integer ticks (0 disables sleeping/reservation)
///
/// Returns a 3-tuple: `{status, sleep_or_retry, count}` where status is
/// `0` admitted, `1` admitted-after-sleep, `2` rejected.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max_count = tonumber(ARGV[3])
local max_sleep = tonumber(ARGV[4])

local window_start = now - window
redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)

local count = redis.call('ZCARD', key)

if count < max_count then
    redis.call('ZADD', key, now, now .. '-' .. redis.call('INCR', key .. ':seq'))
    redis.call('PEXPIRE', key, window)
    redis.call('PEXPIRE', key .. ':seq', window)
    return {0, 0, count + 1}
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local oldest_score = tonumber(oldest[2])
local retry_after = oldest_score + window - now
if retry_after < 0 then retry_after = 0 end

if max_sleep > 0 and retry_after <= max_sleep then
    redis.call('ZADD', key, now + retry_after, (now + retry_after) .. '-' .. redis.call('INCR', key .. ':seq'))
    redis.call('PEXPIRE', key, window + retry_after)
    redis.call('PEXPIRE', key .. ':seq', window + retry_after)
    return {1, retry_after, count + 1}
end

return {2, retry_after, count}
"#;

/// A counter store backend. Implementations must be cheap to clone (an
/// `Arc`-wrapped pool, typically) since one instance is shared across every
/// request the middleware handles.
#[async_trait::async_trait]
pub trait CounterStoreClient: Send + Sync {
    /// Performs the atomic prune/check/record sequence described above.
    async fn check_and_record(
        &self,
        key: &str,
        now_ticks: u64,
        window_ticks: u64,
        max_count: u64,
        max_sleep_ticks: u64,
    ) -> Result<Admission, RateLimitError>;

    /// Lightweight liveness probe used by the fail-open guard before the
    /// first request of a cold connection, and by readiness checks.
    async fn is_available(&self) -> bool;
}

/// `deadpool-redis`-backed implementation.
pub struct RedisCounterStore {
    pool: Pool,
    script: Arc<Script>,
}

impl RedisCounterStore {
    pub fn connect(redis_url: &str) -> Result<Self, RateLimitError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))?;
        Ok(RedisCounterStore {
            pool,
            script: Arc::new(Script::new(SLIDING_WINDOW_SCRIPT)),
        })
    }
}

#[async_trait::async_trait]
impl CounterStoreClient for RedisCounterStore {
    async fn check_and_record(
        &self,
        key: &str,
        now_ticks: u64,
        window_ticks: u64,
        max_count: u64,
        max_sleep_ticks: u64,
    ) -> Result<Admission, RateLimitError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))?;

        let (status, sleep_or_retry, count): (i64, i64, i64) = self
            .script
            .key(key)
            .arg(now_ticks)
            .arg(window_ticks)
            .arg(max_count)
            .arg(max_sleep_ticks)
            .invoke_async(&mut conn)
            .await
            .map_err(RateLimitError::from)?;

        debug!("counter store: key={key} status={status} value={sleep_or_retry} count={count}");

        Ok(match status {
            0 => Admission::Admitted,
            1 => Admission::AdmittedAfterSleep {
                sleep_ticks: sleep_or_retry.max(0) as u64,
            },
            _ => Admission::Rejected {
                retry_after_ticks: sleep_or_retry.max(0) as u64,
            },
        })
    }

    async fn is_available(&self) -> bool {
        let mut conn = match self.pool.get().await {
            Ok(c) => c,
            Err(err) => {
                warn!("counter store unavailable: {err}");
                return false;
            }
        };
        let pong: Result<String, _> = deadpool_redis::redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }
}

/// A cache for remotely-fetched quota limits, keyed by scope. Grounded on
/// `provider.py`'s `_add_rate_limits_to_redis` / `_get_rate_limit_from_redis`:
/// entries expire after `refresh_interval_seconds` so a stale quota can
/// never outlive the configured refresh window.
#[async_trait::async_trait]
pub trait QuotaCache: Send + Sync {
    /// Fetches a previously cached limit string (e.g. `"5r/m"` or `"-1"` for
    /// unlimited), if present and not expired.
    async fn get_cached_limit(&self, key: &str) -> Result<Option<String>, RateLimitError>;

    /// Writes every `(key, limit)` pair with the same expiry, atomically.
    async fn set_cached_limits(
        &self,
        entries: &[(String, String)],
        ttl_seconds: u64,
    ) -> Result<(), RateLimitError>;
}

#[async_trait::async_trait]
impl QuotaCache for RedisCounterStore {
    async fn get_cached_limit(&self, key: &str) -> Result<Option<String>, RateLimitError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))?;
        let value: Option<String> = deadpool_redis::redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(RateLimitError::from)?;
        Ok(value)
    }

    async fn set_cached_limits(
        &self,
        entries: &[(String, String)],
        ttl_seconds: u64,
    ) -> Result<(), RateLimitError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))?;
        let mut pipe = deadpool_redis::redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SET").arg(key).arg(value).arg("EX").arg(ttl_seconds).ignore();
        }
        pipe.query_async(&mut conn).await.map_err(RateLimitError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_variants_are_distinguishable() {
        assert_ne!(Admission::Admitted, Admission::Rejected { retry_after_ticks: 1 });
        assert_eq!(
            Admission::AdmittedAfterSleep { sleep_ticks: 150 },
            Admission::AdmittedAfterSleep { sleep_ticks: 150 }
        );
    }
}
