//! The passthrough backend the demo host serves behind the rate-limit
//! middleware — standing in for "the host's request-processing framework"
//! (spec.md §1's explicit non-goal: this crate never implements routing or
//! proxying, only the middleware that would sit in front of one).

use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde_json::json;

/// Echoes the request path and the classification attributes the
/// middleware read, so a caller can see what was admitted.
pub async fn echo(req: HttpRequest) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "path": req.path(),
        "method": req.method().as_str(),
    })))
}

pub fn configure_backend(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::route().to(echo));
}
