use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::cors::AllowedOrigins;
use crate::middleware::{OriginPolicy, Pipeline, RateLimitStore, RateLimiter, TokenAuthenticator};
use crate::store::RecordStore;

/// Route pipelines, built once at startup.
#[derive(Clone)]
pub struct Pipelines {
    /// Public routes: origin policy only.
    pub public: Arc<Pipeline>,
    /// Admin routes: origin policy and bearer authentication.
    pub protected: Arc<Pipeline>,
    /// Login: origin policy and rate limiting.
    pub login: Arc<Pipeline>,
}

/// The shared application state.
///
/// Everything in here is cheap to clone and safe to share across request
/// tasks. The rate-limit store is the only mutable piece.
#[derive(Clone)]
pub struct AppState {
    /// Record storage.
    pub store: Arc<dyn RecordStore>,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Pipeline counters.
    pub metrics: Metrics,
    /// Window records for every rate-limited route.
    pub rate_limits: RateLimitStore,
    pub pipelines: Pipelines,
}

impl AppState {
    /// Builds state with a system clock for rate limiting.
    pub fn new(store: Arc<dyn RecordStore>, config: AppConfig) -> Self {
        Self::with_rate_limit_store(store, config, RateLimitStore::new())
    }

    /// Builds state around an existing rate-limit store, e.g. one driven by a
    /// manual clock in tests.
    pub fn with_rate_limit_store(store: Arc<dyn RecordStore>, config: AppConfig, rate_limits: RateLimitStore) -> Self {
        let metrics = Metrics::new();
        let origin = OriginPolicy::new(AllowedOrigins::from_config(&config.cors));
        let authenticator = TokenAuthenticator::new(config.auth.jwt_secret.as_bytes());
        let login_window = config.rate_limit.login;
        let login_limiter =
            RateLimiter::new(rate_limits.clone(), login_window.max_requests, login_window.window());

        let pipelines = Pipelines {
            public: Arc::new(Pipeline::builder().origin(origin.clone()).metrics(metrics.clone()).build()),
            protected: Arc::new(
                Pipeline::builder()
                    .origin(origin.clone())
                    .auth(authenticator)
                    .metrics(metrics.clone())
                    .build(),
            ),
            login: Arc::new(
                Pipeline::builder()
                    .origin(origin)
                    .rate_limit(login_limiter)
                    .metrics(metrics.clone())
                    .build(),
            ),
        };

        Self { store, config: Arc::new(config), metrics, rate_limits, pipelines }
    }
}
