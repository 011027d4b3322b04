use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
};

use super::{Flow, Middleware, Stage};
use crate::error::{AppError, AppResult};
use crate::token::{self, TokenClaims};
use crate::types::CallerIdentity;

pub const MISSING_TOKEN: &str = "No authentication token, access denied";
pub const INVALID_TOKEN: &str = "Token is invalid or expired";

/// Verifies `Authorization: Bearer <token>` against the signing secret and
/// attaches the caller's identity to the request extensions.
#[derive(Clone)]
pub struct TokenAuthenticator {
    secret: Arc<[u8]>,
}

impl TokenAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: Arc::from(secret.as_ref()) }
    }

    /// Resolves the caller from the request headers without touching the
    /// request.
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<CallerIdentity> {
        self.verify_claims(headers).map(CallerIdentity::from)
    }

    /// Like [`authenticate`](Self::authenticate), but keeps the full decoded
    /// claims including issue and expiry times.
    pub fn verify_claims(&self, headers: &HeaderMap) -> AppResult<TokenClaims> {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))?;

        match token::verify(provided, &self.secret) {
            Ok(claims) => Ok(claims),
            Err(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                Err(AppError::Unauthorized(INVALID_TOKEN.to_string()))
            }
        }
    }
}

#[async_trait]
impl Middleware for TokenAuthenticator {
    fn stage(&self) -> Stage {
        Stage::Auth
    }

    async fn intercept(&self, req: &mut Request, _response_headers: &mut HeaderMap) -> AppResult<Flow> {
        let claims = self.verify_claims(req.headers())?;
        tracing::debug!(subject = %claims.id, "Authenticated caller");
        req.extensions_mut().insert(CallerIdentity::from(claims.clone()));
        req.extensions_mut().insert(claims);
        Ok(Flow::Continue)
    }
}

/// Extractor for handlers mounted behind a [`TokenAuthenticator`].
///
/// Fails with `Unauthorized` when no identity was attached, so a handler
/// wired up without the authenticator cannot run unauthenticated.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))
    }
}

/// The verified token behind a [`Caller`], for handlers that report it back.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(pub TokenClaims);

impl<S> FromRequestParts<S> for VerifiedClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TokenClaims>()
            .cloned()
            .map(VerifiedClaims)
            .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    const SECRET: &str = "unit-test-secret";

    fn identity() -> CallerIdentity {
        CallerIdentity { subject_id: "64f0c0ffee".to_string(), email: "admin@example.com".to_string() }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn unauthorized_message(result: AppResult<CallerIdentity>) -> String {
        match result {
            Err(AppError::Unauthorized(msg)) => msg,
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let auth = TokenAuthenticator::new(SECRET);
        assert_eq!(unauthorized_message(auth.authenticate(&HeaderMap::new())), MISSING_TOKEN);
        assert_eq!(unauthorized_message(auth.authenticate(&headers_with("Basic abc"))), MISSING_TOKEN);
        assert_eq!(unauthorized_message(auth.authenticate(&headers_with("Bearer "))), MISSING_TOKEN);
        assert_eq!(unauthorized_message(auth.authenticate(&headers_with("bearer abc"))), MISSING_TOKEN);
    }

    #[test]
    fn test_invalid_and_expired_tokens_share_message() {
        let auth = TokenAuthenticator::new(SECRET);
        assert_eq!(unauthorized_message(auth.authenticate(&headers_with("Bearer nope"))), INVALID_TOKEN);

        let expired =
            token::issue_at(&identity(), SECRET.as_bytes(), 1_000, chrono::Duration::hours(24)).unwrap();
        let msg = unauthorized_message(auth.authenticate(&headers_with(&format!("Bearer {}", expired))));
        assert_eq!(msg, INVALID_TOKEN);

        let foreign = token::issue(&identity(), b"another-secret").unwrap();
        let msg = unauthorized_message(auth.authenticate(&headers_with(&format!("Bearer {}", foreign))));
        assert_eq!(msg, INVALID_TOKEN);
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let auth = TokenAuthenticator::new(SECRET);
        let token = token::issue(&identity(), SECRET.as_bytes()).unwrap();
        let mut req = Request::builder()
            .uri("/api/auth/verify")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let mut headers = HeaderMap::new();

        let flow = auth.intercept(&mut req, &mut headers).await.unwrap();
        assert!(matches!(flow, Flow::Continue));
        assert_eq!(req.extensions().get::<CallerIdentity>(), Some(&identity()));
        let claims = req.extensions().get::<TokenClaims>().unwrap();
        assert_eq!(claims.id, identity().subject_id);
        assert_eq!(claims.exp - claims.iat, token::TOKEN_TTL_HOURS * 3600);
    }
}
