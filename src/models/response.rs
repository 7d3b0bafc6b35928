//! Reject and blacklist response rendering.
//!
//! Grounded on `rate_limit/response.py`'s `RateLimitExceededResponse` and
//! `BlacklistResponse`: a configurable status line, header set, and either a
//! plain-text body or a JSON body, with sane defaults when the
//! configuration leaves them unset.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

/// A configurable HTTP response shape, built once from the YAML
/// configuration and reused for every rejected or blacklisted request of
/// that kind.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub status_code: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub json_body: Option<serde_json::Value>,
}

impl ResponseSpec {
    pub fn default_reject() -> Self {
        ResponseSpec {
            status_code: StatusCode::TOO_MANY_REQUESTS,
            headers: Vec::new(),
            body: None,
            json_body: Some(json!({
                "error": {
                    "status": "429 Too Many Requests",
                    "message": "Too Many Requests",
                }
            })),
        }
    }

    pub fn default_blacklist() -> Self {
        ResponseSpec {
            status_code: StatusCode::from_u16(497).unwrap_or(StatusCode::FORBIDDEN),
            headers: Vec::new(),
            body: None,
            json_body: Some(json!({
                "error": {
                    "status": "497 Blacklisted",
                    "message": "Blacklisted",
                }
            })),
        }
    }

    /// Renders the response, layering the rate-limit headers (limit,
    /// remaining, retry-after) on top of any statically configured headers.
    pub fn render(&self, rate_limit_headers: &[(String, String)]) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code);
        for (name, value) in &self.headers {
            builder.insert_header((name.as_str(), value.as_str()));
        }
        for (name, value) in rate_limit_headers {
            builder.insert_header((name.as_str(), value.as_str()));
        }
        if let Some(json_body) = &self.json_body {
            return builder.json(json_body);
        }
        if let Some(body) = &self.body {
            return builder.body(body.clone());
        }
        builder.finish()
    }
}

/// Builds the `X-RateLimit-*` / `Retry-After` header set for a rejection.
///
/// `limit` is the applied spec's display string (e.g. `"5r/m"`); `retry_after`
/// is the number of whole seconds the client should wait.
pub fn rate_limit_headers(limit: &str, retry_after_seconds: u64) -> Vec<(String, String)> {
    vec![
        ("X-RateLimit-Limit".to_string(), limit.to_string()),
        ("X-RateLimit-Remaining".to_string(), "0".to_string()),
        (
            "X-RateLimit-Retry-After".to_string(),
            retry_after_seconds.to_string(),
        ),
        ("X-Retry-After".to_string(), retry_after_seconds.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reject_is_429_with_json_body() {
        let spec = ResponseSpec::default_reject();
        assert_eq!(spec.status_code, StatusCode::TOO_MANY_REQUESTS);
        assert!(spec.json_body.is_some());
        assert!(spec.body.is_none());
    }

    #[test]
    fn default_blacklist_is_497() {
        let spec = ResponseSpec::default_blacklist();
        assert_eq!(spec.status_code.as_u16(), 497);
    }

    #[test]
    fn headers_carry_retry_after() {
        let headers = rate_limit_headers("5r/m", 12);
        assert!(headers.iter().any(|(k, v)| k == "X-Retry-After" && v == "12"));
        assert!(headers.iter().any(|(k, v)| k == "X-RateLimit-Limit" && v == "5r/m"));
    }
}
