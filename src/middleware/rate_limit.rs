//! Actix Web middleware wiring for the decision pipeline.
//!
//! Structured the same way as this codebase's own JWT authentication
//! middleware (`Transform` builds a `Rc`-shared config once, `Service::call`
//! boxes an async block that either renders a response or forwards to the
//! wrapped service) but drives [`crate::services::pipeline::run`] instead of
//! token validation. Grounded on `rate_limit.py`'s `__call__`: every branch
//! here either returns a rendered response or calls through, and no error
//! from the pipeline's collaborators is allowed to propagate past `call` —
//! fail-open is enforced inside the pipeline itself, not here.

use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};

use crate::models::classification::RequestAttributes;
use crate::models::response::rate_limit_headers;
use crate::services::pipeline::{self, PipelineConfig, PipelineDecision};

/// Installs the pipeline ahead of the wrapped service:
/// `App::new().wrap(RateLimit::new(config))`.
pub struct RateLimit {
    config: Rc<PipelineConfig>,
}

impl RateLimit {
    pub fn new(config: PipelineConfig) -> Self {
        RateLimit { config: Rc::new(config) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
            config: self.config.clone(),
        })
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    config: Rc<PipelineConfig>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let attrs = req
                .extensions()
                .get::<RequestAttributes>()
                .cloned()
                .unwrap_or_default();
            let now_ticks = current_ticks(config.clock_accuracy);

            match pipeline::run(&config, &attrs, now_ticks).await {
                PipelineDecision::Passthrough => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_boxed_body())
                }
                PipelineDecision::Reject {
                    applied_spec_display,
                    retry_after_seconds,
                } => {
                    let headers = rate_limit_headers(&applied_spec_display, retry_after_seconds);
                    Ok(req.into_response(config.reject_response.render(&headers).map_into_boxed_body()))
                }
                PipelineDecision::Blacklist => {
                    Ok(req.into_response(config.blacklist_response.render(&[]).map_into_boxed_body()))
                }
            }
        })
    }
}

/// Wall-clock time expressed in the configured clock-accuracy ticks, the
/// same unit the admission engine and counter store operate in.
fn current_ticks(clock_accuracy: u64) -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs_f64() * clock_accuracy as f64).round() as u64
}
