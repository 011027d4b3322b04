//! HTTP route handlers for the Clownlist API.
//!
//! - `auth`: login and token verification
//! - `clowns`: ban list records
//! - `health`: liveness, metrics and version endpoints
//!
//! Each method of each path is mounted behind one of the pipelines in
//! [`AppState::pipelines`]. Preflight requests and unsupported methods go
//! through the public pipeline so they still carry CORS headers.

use std::sync::Arc;

use axum::{
    extract::FromRequest,
    handler::Handler,
    middleware::from_fn_with_state,
    routing::{get, on, MethodFilter, MethodRouter},
    Router,
};

use crate::error::AppError;
use crate::middleware::{pipeline_middleware, Pipeline};
use crate::state::AppState;

pub mod auth;
pub mod clowns;
pub mod health;

/// JSON body extractor whose rejections use the API error format.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Mounts `handler` for `filter` behind `pipeline`.
fn guarded<H, T>(filter: MethodFilter, handler: H, pipeline: &Arc<Pipeline>) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    on(filter, handler).route_layer(from_fn_with_state(pipeline.clone(), pipeline_middleware))
}

/// Answered by the origin policy before it is ever reached.
async fn preflight() {}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Preflight and 405 handling shared by every API path.
fn api_route(state: &AppState, methods: MethodRouter<AppState>) -> MethodRouter<AppState> {
    let public = &state.pipelines.public;
    methods
        .merge(guarded(MethodFilter::OPTIONS, preflight, public))
        .fallback(method_not_allowed.layer(from_fn_with_state(public.clone(), pipeline_middleware)))
}

pub fn router(state: AppState) -> Router {
    let p = state.pipelines.clone();

    let clowns_collection = api_route(
        &state,
        guarded(MethodFilter::GET, clowns::list_clowns, &p.public)
            .merge(guarded(MethodFilter::POST, clowns::add_clown, &p.protected)),
    );
    let clowns_item = api_route(
        &state,
        guarded(MethodFilter::GET, clowns::get_clown, &p.public)
            .merge(guarded(MethodFilter::PUT, clowns::update_clown, &p.protected))
            .merge(guarded(MethodFilter::DELETE, clowns::delete_clown, &p.protected)),
    );
    let login = api_route(&state, guarded(MethodFilter::POST, auth::login, &p.login));
    let verify = api_route(&state, guarded(MethodFilter::GET, auth::verify, &p.protected));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .route("/version", get(health::version))
        .route("/api/clowns", clowns_collection)
        .route("/api/clowns/{id}", clowns_item)
        .route("/api/auth/login", login)
        .route("/api/auth/verify", verify)
        .with_state(state)
}
