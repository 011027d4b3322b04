//! Ordered composition of request interceptors.

use std::{future::Future, sync::Arc};

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;

use super::{Flow, Middleware, OriginPolicy, RateLimiter, Stage, TokenAuthenticator};
use crate::error::AppError;
use crate::metrics::Metrics;

/// A fixed sequence of interceptors placed in front of an inner handler.
///
/// Stages always run as origin policy, then rate limiting, then
/// authentication, regardless of the order they were added in. The first
/// stage that answers or fails ends the run. Headers collected by earlier
/// stages are copied onto whatever response comes out.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
    metrics: Option<Metrics>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The stages in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|m| m.stage()).collect()
    }

    /// Runs `req` through every stage and, if none of them answered, through
    /// `inner`.
    pub async fn run<F, Fut>(&self, mut req: Request, inner: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        if let Some(m) = &self.metrics {
            m.inc_requests();
        }

        let mut headers = HeaderMap::new();
        for stage in &self.stages {
            match stage.intercept(&mut req, &mut headers).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Respond(res)) => {
                    if let Some(m) = &self.metrics {
                        if stage.stage() == Stage::Origin {
                            m.inc_preflight();
                        }
                    }
                    return with_headers(res, headers);
                }
                Err(e) => {
                    self.record_rejection(&e);
                    return with_headers(e.into_response(), headers);
                }
            }
        }

        with_headers(inner(req).await, headers)
    }

    /// Wraps `inner` into a single callable handler.
    pub fn into_handler<F, Fut>(self, inner: F) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone
    where
        F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let pipeline = Arc::new(self);
        move |req: Request| {
            let pipeline = pipeline.clone();
            let inner = inner.clone();
            Box::pin(async move { pipeline.run(req, inner).await }) as BoxFuture<'static, Response>
        }
    }

    fn record_rejection(&self, err: &AppError) {
        let Some(m) = &self.metrics else { return };
        match err {
            AppError::RateLimited { .. } => m.inc_throttled(),
            AppError::Unauthorized(_) => m.inc_denied(),
            _ => {}
        }
    }
}

fn with_headers(mut res: Response, headers: HeaderMap) -> Response {
    res.headers_mut().extend(headers);
    res
}

/// Collects interceptors for a [`Pipeline`]. Adding a stage kind twice keeps
/// the last one.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Middleware>>,
    metrics: Option<Metrics>,
}

impl PipelineBuilder {
    pub fn origin(self, policy: OriginPolicy) -> Self {
        self.with(Arc::new(policy))
    }

    pub fn rate_limit(self, limiter: RateLimiter) -> Self {
        self.with(Arc::new(limiter))
    }

    pub fn auth(self, authenticator: TokenAuthenticator) -> Self {
        self.with(Arc::new(authenticator))
    }

    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        let stage = middleware.stage();
        self.stages.retain(|m| m.stage() != stage);
        self.stages.push(middleware);
        self
    }

    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(mut self) -> Pipeline {
        self.stages.sort_by_key(|m| m.stage());
        Pipeline { stages: self.stages, metrics: self.metrics }
    }
}

/// Axum adapter: mount with `from_fn_with_state(Arc<Pipeline>, pipeline_middleware)`.
pub async fn pipeline_middleware(State(pipeline): State<Arc<Pipeline>>, req: Request, next: Next) -> Response {
    pipeline.run(req, |req| next.run(req)).await
}
