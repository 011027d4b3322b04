use super::ip::{client_from_headers, rate_limit_key};
use super::{Flow, Middleware, Stage};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use axum::{extract::Request, http::HeaderMap};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

/// Source of "now" for window bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time via `Instant::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { origin: Instant::now(), offset_ms: AtomicU64::new(0) }
    }

    /// Moves the clock to `elapsed` after its creation. Never moves backwards.
    pub fn set(&self, elapsed: Duration) {
        self.offset_ms.fetch_max(elapsed.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Request count for one client/path key within its current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub key: String,
    pub count: u32,
    pub window_start: Instant,
    pub window: Duration,
}

impl RateLimitRecord {
    fn is_expired(&self, now: Instant) -> bool {
        // A clock that went backwards yields zero elapsed, keeping the record.
        now.saturating_duration_since(self.window_start) > self.window
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Count after this request, capped at `max + 1`.
    pub count: u32,
    /// Time until the key's window resets.
    pub retry_after: Duration,
}

/// In-memory window records, owned by whoever builds the pipeline.
///
/// Records are process-local and vanish on restart. Every update runs under
/// one mutex, so counts are exact under concurrent requests.
#[derive(Clone)]
pub struct RateLimitStore {
    records: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { records: Arc::new(Mutex::new(HashMap::new())), clock }
    }

    /// Counts one request for `key`.
    ///
    /// Expired records for every key are swept first, then the key's record
    /// is fetched or created, reset if its window has elapsed, and
    /// incremented. The request is allowed while the count stays within
    /// `max_requests`.
    pub async fn hit(&self, key: &str, window: Duration, max_requests: u32) -> RateLimitDecision {
        let now = self.clock.now();
        let mut records = self.records.lock().await;

        records.retain(|_, r| !r.is_expired(now));

        let record = records.entry(key.to_string()).or_insert_with(|| RateLimitRecord {
            key: key.to_string(),
            count: 0,
            window_start: now,
            window,
        });
        record.window = window;
        if record.is_expired(now) {
            record.count = 0;
            record.window_start = now;
        }

        if record.count <= max_requests {
            record.count += 1;
        }

        let elapsed = now.saturating_duration_since(record.window_start);
        RateLimitDecision {
            allowed: record.count <= max_requests,
            count: record.count,
            retry_after: window.saturating_sub(elapsed),
        }
    }

    /// Drops every record whose window has elapsed. Returns how many were
    /// removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        before - records.len()
    }

    pub async fn get(&self, key: &str) -> Option<RateLimitRecord> {
        self.records.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Per-route limiter: at most `max_requests` per client and path within
/// `window`.
#[derive(Clone)]
pub struct RateLimiter {
    store: RateLimitStore,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    /// Default window for protected routes.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
    /// Default request budget per window.
    pub const DEFAULT_MAX_REQUESTS: u32 = 5;

    pub fn new(store: RateLimitStore, max_requests: u32, window: Duration) -> Self {
        Self { store, max_requests, window }
    }

    pub fn with_defaults(store: RateLimitStore) -> Self {
        Self::new(store, Self::DEFAULT_MAX_REQUESTS, Self::DEFAULT_WINDOW)
    }

    pub fn store(&self) -> &RateLimitStore {
        &self.store
    }

    /// Counts a request for `key` and fails with `RateLimited` once the
    /// budget is exhausted.
    pub async fn check(&self, key: &str) -> AppResult<u32> {
        let decision = self.store.hit(key, self.window, self.max_requests).await;
        if decision.allowed {
            return Ok(decision.count);
        }

        let retry_after_seconds = decision.retry_after.as_secs() + u64::from(decision.retry_after.subsec_nanos() > 0);
        tracing::warn!(key, retry_after_seconds, "Rate limit exceeded");
        Err(AppError::RateLimited { retry_after_seconds })
    }
}

#[async_trait]
impl Middleware for RateLimiter {
    fn stage(&self) -> Stage {
        Stage::RateLimit
    }

    async fn intercept(&self, req: &mut Request, _response_headers: &mut HeaderMap) -> AppResult<Flow> {
        let client = client_from_headers(req.headers());
        let key = rate_limit_key(&client, req.uri().path());
        self.check(&key).await?;
        Ok(Flow::Continue)
    }
}

/// A background task that periodically drops expired records from a store.
///
/// Inline sweeping only runs when requests arrive; this bounds memory for
/// keys that are never seen again.
pub async fn cleanup_task(store: RateLimitStore, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;
        let removed = store.purge_expired().await;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired rate limit records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn limiter(max: u32, window_ms: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = RateLimitStore::with_clock(clock.clone());
        (RateLimiter::new(store, max, Duration::from_millis(window_ms)), clock)
    }

    #[tokio::test]
    async fn test_window_scenario() {
        let (limiter, clock) = limiter(3, 1000);

        assert_eq!(limiter.check("k").await.unwrap(), 1);
        clock.set(Duration::from_millis(100));
        assert_eq!(limiter.check("k").await.unwrap(), 2);
        clock.set(Duration::from_millis(200));
        assert_eq!(limiter.check("k").await.unwrap(), 3);
        clock.set(Duration::from_millis(300));
        let err = limiter.check("k").await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);

        clock.set(Duration::from_millis(1001));
        assert_eq!(limiter.check("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_window_boundary_is_inclusive() {
        let (limiter, clock) = limiter(1, 1000);
        assert!(limiter.check("k").await.is_ok());
        clock.set(Duration::from_millis(1000));
        assert!(limiter.check("k").await.is_err());
        clock.set(Duration::from_millis(1001));
        assert!(limiter.check("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_count_never_exceeds_max_plus_one() {
        let (limiter, _clock) = limiter(2, 1000);
        for _ in 0..10 {
            let _ = limiter.check("k").await;
        }
        assert_eq!(limiter.store().get("k").await.unwrap().count, 3);
    }

    #[tokio::test]
    async fn test_different_keys() {
        let (limiter, _clock) = limiter(1, 1000);
        assert!(limiter.check("1.1.1.1:/a").await.is_ok());
        assert!(limiter.check("2.2.2.2:/a").await.is_ok());
        assert!(limiter.check("1.1.1.1:/b").await.is_ok());
        assert!(limiter.check("1.1.1.1:/a").await.is_err());
        assert!(limiter.check("2.2.2.2:/a").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_records_swept_inline() {
        let (limiter, clock) = limiter(5, 1000);
        limiter.check("old").await.unwrap();
        clock.set(Duration::from_millis(500));
        limiter.check("recent").await.unwrap();
        assert_eq!(limiter.store().len().await, 2);

        clock.set(Duration::from_millis(1200));
        limiter.check("new").await.unwrap();
        assert!(limiter.store().get("old").await.is_none());
        assert!(limiter.store().get("recent").await.is_some());
        assert_eq!(limiter.store().len().await, 2);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (limiter, clock) = limiter(5, 1000);
        limiter.check("a").await.unwrap();
        limiter.check("b").await.unwrap();
        assert_eq!(limiter.store().purge_expired().await, 0);
        clock.advance(Duration::from_millis(1500));
        assert_eq!(limiter.store().purge_expired().await, 2);
        assert!(limiter.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_retry_after_reflects_remaining_window() {
        let clock = Arc::new(ManualClock::new());
        let store = RateLimitStore::with_clock(clock.clone());
        let limiter = RateLimiter::new(store, 1, Duration::from_secs(900));
        limiter.check("k").await.unwrap();
        clock.set(Duration::from_secs(100));
        match limiter.check("k").await {
            Err(AppError::RateLimited { retry_after_seconds }) => assert_eq!(retry_after_seconds, 800),
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_intercept_keys_by_forwarded_client_and_path() {
        let (limiter, _clock) = limiter(1, 1000);
        let request = |ip: &'static str| {
            Request::builder()
                .uri("/api/auth/login")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };
        let mut headers = HeaderMap::new();

        assert!(limiter.intercept(&mut request("9.9.9.9"), &mut headers).await.is_ok());
        assert!(limiter.intercept(&mut request("8.8.8.8"), &mut headers).await.is_ok());
        assert!(limiter.intercept(&mut request("9.9.9.9"), &mut headers).await.is_err());
        assert!(limiter.store().get("9.9.9.9:/api/auth/login").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_hits_are_counted_exactly() {
        let (limiter, _clock) = limiter(50, 60_000);
        let mut handles = Vec::new();
        for _ in 0..100 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.check("k").await.is_ok() }));
        }
        let mut allowed = 0;
        for h in handles {
            if h.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
        assert_eq!(limiter.store().get("k").await.unwrap().count, 51);
    }
}
