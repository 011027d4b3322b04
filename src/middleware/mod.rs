//! Middleware components for HTTP request processing.
//!
//! Every interceptor implements [`Middleware`]. A [`pipeline::Pipeline`]
//! holds an ordered list of them and runs them in front of an inner handler:
//! origin policy first, then rate limiting, then authentication. The
//! validation helpers are called by handlers on the payload itself.

use async_trait::async_trait;
use axum::{extract::Request, http::HeaderMap, response::Response};

use crate::error::AppResult;

pub mod auth;
pub mod cors;
pub mod ip;
pub mod pipeline;
pub mod rate_limit;
pub mod validation;

pub use auth::TokenAuthenticator;
pub use cors::OriginPolicy;
pub use pipeline::{pipeline_middleware, Pipeline, PipelineBuilder};
pub use rate_limit::{Clock, ManualClock, RateLimitStore, RateLimiter, SystemClock};

/// Position of an interceptor in a pipeline. Pipelines always run stages in
/// ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Origin,
    RateLimit,
    Auth,
}

/// What an interceptor decided about a request.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage.
    Continue,
    /// Stop here and send this response.
    Respond(Response),
}

/// A request interceptor.
///
/// `response_headers` collects headers that must appear on whatever response
/// the pipeline finally produces, including rejections by later stages.
/// Returning `Err` terminates the pipeline with the error's response.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn stage(&self) -> Stage;

    async fn intercept(&self, req: &mut Request, response_headers: &mut HeaderMap) -> AppResult<Flow>;
}
