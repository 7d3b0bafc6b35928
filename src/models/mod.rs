//! Data types shared across the admission engine, providers and middleware.

pub mod classification;
pub mod decision;
pub mod error;
pub mod rate_spec;
pub mod response;
pub mod rules;
