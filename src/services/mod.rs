//! Collaborators the admission pipeline depends on: the counter store, the
//! two limit providers, the identity client, and the metrics sink.

pub mod admission;
pub mod counter_store;
pub mod identity;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod quota_provider;
pub mod static_provider;
