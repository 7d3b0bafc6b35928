//! The Actix Web `Transform`/`Service` wiring for the rate-limit decision
//! pipeline.
//!
//! [`rate_limit::RateLimit`] is the only middleware this crate ships; the
//! orchestration logic it drives lives in [`crate::services::pipeline`] so
//! it stays independent of Actix Web.

pub mod rate_limit;
