//! Cross-origin access policy.
//!
//! Resolves the caller's origin against a fixed allow-list plus a trusted
//! hosting domain, writes the CORS response headers, and answers preflight
//! requests on its own.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};

use super::validation::sanitize_for_logging;
use super::{Flow, Middleware, Stage};
use crate::config::CorsConfig;
use crate::error::AppResult;

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Immutable allow-list established at startup.
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
    trusted_domain: Option<String>,
}

impl AllowedOrigins {
    /// `origins` must not be empty: its first entry is the default origin.
    pub fn new(origins: Vec<String>, trusted_domain: Option<String>) -> Self {
        let trusted_domain = trusted_domain.filter(|d| !d.trim().is_empty());
        Self { origins, trusted_domain }
    }

    pub fn from_config(cfg: &CorsConfig) -> Self {
        Self::new(cfg.allowed_origins.clone(), cfg.trusted_domain.clone())
    }

    /// Origin sent back to callers that are not permitted.
    pub fn default_origin(&self) -> &str {
        self.origins.first().map(String::as_str).unwrap_or("")
    }

    /// Exact match against the list, or substring match on the trusted
    /// hosting domain (preview deployments get generated host names).
    pub fn is_allowed(&self, origin: &str) -> bool {
        if self.origins.iter().any(|o| o == origin) {
            return true;
        }
        match &self.trusted_domain {
            Some(domain) => !origin.is_empty() && origin.contains(domain.as_str()),
            None => false,
        }
    }

    /// The value for `Access-Control-Allow-Origin`.
    pub fn resolve<'a>(&'a self, origin: Option<&'a str>) -> &'a str {
        match origin {
            Some(o) if self.is_allowed(o) => o,
            _ => self.default_origin(),
        }
    }
}

/// Reads the declared origin, falling back to the referer when the origin is
/// absent, empty or not valid text.
pub fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .or_else(|| headers.get(header::REFERER).and_then(|v| v.to_str().ok()))
}

/// Builds the full CORS header set for a request origin.
pub fn cors_headers(allowed: &AllowedOrigins, origin: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let allow_origin = HeaderValue::from_str(allowed.resolve(origin))
        .or_else(|_| HeaderValue::from_str(allowed.default_origin()))
        .unwrap_or_else(|_| HeaderValue::from_static(""));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers
}

/// The origin policy stage.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: AllowedOrigins,
}

impl OriginPolicy {
    pub fn new(allowed: AllowedOrigins) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &AllowedOrigins {
        &self.allowed
    }
}

#[async_trait]
impl Middleware for OriginPolicy {
    fn stage(&self) -> Stage {
        Stage::Origin
    }

    async fn intercept(&self, req: &mut Request, response_headers: &mut HeaderMap) -> AppResult<Flow> {
        let origin = request_origin(req.headers());
        if let Some(o) = origin {
            if !self.allowed.is_allowed(o) {
                tracing::debug!("Origin not permitted: {}", sanitize_for_logging(o));
            }
        }
        response_headers.extend(cors_headers(&self.allowed, origin));

        if req.method() == Method::OPTIONS {
            return Ok(Flow::Respond(StatusCode::OK.into_response()));
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn allowed() -> AllowedOrigins {
        AllowedOrigins::new(
            vec!["https://clowns.example".to_string(), "http://localhost:3000".to_string()],
            Some("vercel.app".to_string()),
        )
    }

    #[test]
    fn test_exact_and_trusted_domain_matching() {
        let a = allowed();
        assert!(a.is_allowed("http://localhost:3000"));
        assert!(a.is_allowed("https://clowns-git-main.vercel.app"));
        assert!(!a.is_allowed("https://evil.example"));
        assert!(!a.is_allowed(""));
        // Substring heuristic: accepted even when not a suffix.
        assert!(a.is_allowed("https://vercel.app.evil.example"));
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let a = allowed();
        assert_eq!(a.resolve(Some("http://localhost:3000")), "http://localhost:3000");
        assert_eq!(a.resolve(Some("https://evil.example")), "https://clowns.example");
        assert_eq!(a.resolve(None), "https://clowns.example");
    }

    #[test]
    fn test_without_trusted_domain_only_exact_matches() {
        let a = AllowedOrigins::new(vec!["https://a.example".to_string()], Some("  ".to_string()));
        assert!(a.is_allowed("https://a.example"));
        assert!(!a.is_allowed("https://b.vercel.app"));
    }

    #[test]
    fn test_referer_used_when_origin_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("http://localhost:3000"));
        assert_eq!(request_origin(&headers), Some("http://localhost:3000"));
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://clowns.example"));
        assert_eq!(request_origin(&headers), Some("https://clowns.example"));
    }

    #[test]
    fn test_empty_or_unreadable_origin_falls_back_to_referer() {
        let policy = AllowedOrigins::new(
            vec!["http://localhost:3000".to_string()],
            Some("vercel.app".to_string()),
        );
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static(""));
        headers.insert(header::REFERER, HeaderValue::from_static("https://preview.vercel.app"));
        assert_eq!(request_origin(&headers), Some("https://preview.vercel.app"));
        let cors = cors_headers(&policy, request_origin(&headers));
        assert_eq!(cors[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://preview.vercel.app");

        headers.insert(header::ORIGIN, HeaderValue::from_bytes(b"https://caf\xe9.example").unwrap());
        assert_eq!(request_origin(&headers), Some("https://preview.vercel.app"));

        headers.remove(header::REFERER);
        assert_eq!(request_origin(&headers), None);
    }

    #[tokio::test]
    async fn test_rejected_origin_is_logged_sanitized() {
        let forged = "https://evil.example\t\" level=\"admin";
        let mut req = Request::builder()
            .method(Method::GET)
            .uri("/api/clowns")
            .header(header::ORIGIN, forged)
            .body(Body::empty())
            .unwrap();
        let origin = request_origin(req.headers()).unwrap();
        assert_eq!(sanitize_for_logging(origin), "https://evil.example\\\" level=\\\"admin");

        let mut headers = HeaderMap::new();
        let flow = OriginPolicy::new(allowed()).intercept(&mut req, &mut headers).await.unwrap();
        assert!(matches!(flow, Flow::Continue));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://clowns.example");
    }

    #[tokio::test]
    async fn test_preflight_terminates() {
        let policy = OriginPolicy::new(allowed());
        let mut req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/clowns")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let mut headers = HeaderMap::new();

        let flow = policy.intercept(&mut req, &mut headers).await.unwrap();
        match flow {
            Flow::Respond(res) => assert_eq!(res.status(), StatusCode::OK),
            Flow::Continue => panic!("preflight must terminate"),
        }
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_other_methods_continue() {
        let policy = OriginPolicy::new(allowed());
        let mut req = Request::builder()
            .method(Method::GET)
            .uri("/api/clowns")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let mut headers = HeaderMap::new();

        let flow = policy.intercept(&mut req, &mut headers).await.unwrap();
        assert!(matches!(flow, Flow::Continue));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://clowns.example");
    }
}
