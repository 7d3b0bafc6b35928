//! Configuration for the rate-limit middleware: the YAML rule document and
//! the WSGI-equivalent init options that parameterize one middleware
//! instance.
//!
//! Configuration is read once at startup and is immutable for the process
//! lifetime (spec.md §3 "Lifecycles"): a [`document::ConfigDocument`] is
//! parsed and indexed into a [`crate::models::rules::RuleIndex`], and
//! [`settings::MiddlewareSettings`] carries everything else the original
//! middleware read from its WSGI `local_conf`.

pub mod document;
pub mod settings;
