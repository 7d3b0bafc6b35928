//! HTTP route handlers for the demo host.
//!
//! The demo host is a stand-in for "the host's request-processing
//! framework" (spec.md §1) — enough of an Actix Web application to exercise
//! [`crate::middleware::rate_limit::RateLimit`] end to end, not a general
//! gateway.

pub mod backend;
pub mod health;
