//! Parsing and formatting of rate-limit spec strings such as `"5r/m"` or
//! `"2r/15m"`.
//!
//! Grounded on `rate_limit/units.py::Units` from the original middleware:
//! conversion factors to seconds, then multiplied by the configured clock
//! accuracy to obtain integer window ticks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// A time unit accepted in a rate-limit spec string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanosecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "ns" => Some(TimeUnit::Nanosecond),
            "ms" => Some(TimeUnit::Millisecond),
            "s" => Some(TimeUnit::Second),
            "m" => Some(TimeUnit::Minute),
            "h" => Some(TimeUnit::Hour),
            "d" => Some(TimeUnit::Day),
            _ => None,
        }
    }

    /// Conversion factor to base 1 second, per spec.md §4.1.
    fn factor_seconds(self) -> f64 {
        match self {
            TimeUnit::Nanosecond => 1e-9,
            TimeUnit::Millisecond => 1e-3,
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
            TimeUnit::Hour => 3600.0,
            TimeUnit::Day => 86400.0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Nanosecond => "ns",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Second => "s",
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
        }
    }
}

/// A parsed, positive sliding-window rate limit.
///
/// Invariant: `window_value > 0`. The unlimited case is represented
/// separately by [`Limit::Unlimited`], never by a `RateSpec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSpec {
    pub max_count: u64,
    pub window_value: u64,
    pub window_unit: TimeUnit,
}

impl RateSpec {
    /// The sliding window expressed in seconds.
    pub fn window_seconds(&self) -> f64 {
        self.window_value as f64 * self.window_unit.factor_seconds()
    }

    /// The sliding window in integer ticks at the given clock accuracy
    /// (ticks per second, e.g. 1000 for millisecond ticks).
    pub fn window_ticks(&self, clock_accuracy: u64) -> u64 {
        (self.window_seconds() * clock_accuracy as f64).round().max(1.0) as u64
    }
}

impl fmt::Display for RateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.window_value == 1 {
            write!(f, "{}r/{}", self.max_count, self.window_unit.as_str())
        } else {
            write!(
                f,
                "{}r/{}{}",
                self.max_count,
                self.window_value,
                self.window_unit.as_str()
            )
        }
    }
}

/// The provider-level result of a spec lookup: either a parsed spec, or the
/// unlimited sentinel. Never a bare `-1` in Rust code — that sentinel value
/// is confined to the wire/config boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Unlimited,
    Spec(RateSpec),
}

impl Limit {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }
}

static SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<value>[0-9]*\.?[0-9]+)r/(?P<wv>[0-9]*)(?P<wu>ns|ms|s|m|h|d)$").unwrap()
});

/// Parses a rate spec string like `"5r/m"`, `"2r/15m"`, `"10r/s"`.
///
/// Non-positive values, missing window values (defaulted to 1), and unknown
/// window units are handled per spec.md §4.1: malformed input or a
/// non-positive count both resolve to [`Limit::Unlimited`] rather than an
/// error — callers at the provider boundary never see a parse failure.
pub fn parse_rate_spec(raw: &str) -> Limit {
    let caps = match SPEC_RE.captures(raw.trim()) {
        Some(c) => c,
        None => return Limit::Unlimited,
    };

    let value: f64 = match caps["value"].parse() {
        Ok(v) => v,
        Err(_) => return Limit::Unlimited,
    };
    if value <= 0.0 {
        return Limit::Unlimited;
    }
    let max_count = value.round().max(1.0) as u64;

    let window_value: u64 = if caps["wv"].is_empty() {
        1
    } else {
        match caps["wv"].parse() {
            Ok(v) if v > 0 => v,
            _ => return Limit::Unlimited,
        }
    };

    let window_unit = match TimeUnit::from_str(&caps["wu"]) {
        Some(u) => u,
        None => return Limit::Unlimited,
    };

    Limit::Spec(RateSpec {
        max_count,
        window_value,
        window_unit,
    })
}
