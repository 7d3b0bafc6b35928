//! Internal error taxonomy for the rate limit middleware.
//!
//! None of these variants is allowed to escape the middleware boundary: the
//! decision pipeline and admission engine catch every one of them and
//! resolve to a [`crate::models::decision::RateLimitDecision`] or a plain
//! passthrough instead. They exist so internal helpers can use `?` and so
//! failures are logged with useful context.

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The request lacked one or more mandatory classification attributes.
    #[error("request classification incomplete")]
    ClassificationMissing,

    /// The YAML configuration document failed to load or did not match the
    /// expected schema.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The counter store could not be reached or did not answer in time.
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// The counter store returned something the client could not interpret.
    #[error("counter store protocol error: {0}")]
    StoreProtocol(String),

    /// The remote quota provider could not be reached or returned malformed
    /// data.
    #[error("quota provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<redis::RedisError> for RateLimitError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_io_error() {
            RateLimitError::StoreUnavailable(err.to_string())
        } else {
            RateLimitError::StoreProtocol(err.to_string())
        }
    }
}

impl From<reqwest::Error> for RateLimitError {
    fn from(err: reqwest::Error) -> Self {
        RateLimitError::ProviderUnavailable(err.to_string())
    }
}
