//! Compact HS256 bearer tokens.
//!
//! Tokens are JWT-shaped (`header.payload.signature`, base64url without
//! padding) and carry `{ id, email, iat, exp }`. Only the symmetric HS256
//! algorithm is accepted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::types::CallerIdentity;

type HmacSha256 = Hmac<Sha256>;

/// Validity of freshly issued tokens.
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not made of three segments")]
    Malformed,
    #[error("token segment is not valid base64url")]
    Encoding,
    #[error("token header or claims are not valid JSON")]
    Claims,
    #[error("unsupported token algorithm: {0}")]
    Algorithm(String),
    #[error("token signature does not match")]
    Signature,
    #[error("token has expired")]
    Expired,
    #[error("signing key rejected")]
    Key,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject id of the caller.
    pub id: String,
    pub email: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl From<TokenClaims> for CallerIdentity {
    fn from(claims: TokenClaims) -> Self {
        CallerIdentity { subject_id: claims.id, email: claims.email }
    }
}

fn mac(secret: &[u8]) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Key)
}

/// Issues a token for `identity` valid for `ttl`, starting at `issued_at`
/// (seconds since the epoch).
pub fn issue_at(
    identity: &CallerIdentity,
    secret: &[u8],
    issued_at: i64,
    ttl: Duration,
) -> Result<String, TokenError> {
    let header = Header { alg: "HS256".to_string(), typ: Some("JWT".to_string()) };
    let claims = TokenClaims {
        id: identity.subject_id.clone(),
        email: identity.email.clone(),
        iat: issued_at,
        exp: issued_at + ttl.num_seconds(),
    };

    let header = serde_json::to_vec(&header).map_err(|_| TokenError::Claims)?;
    let claims = serde_json::to_vec(&claims).map_err(|_| TokenError::Claims)?;
    let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims));

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// Issues a token valid for [`TOKEN_TTL_HOURS`] from now.
pub fn issue(identity: &CallerIdentity, secret: &[u8]) -> Result<String, TokenError> {
    issue_at(identity, secret, Utc::now().timestamp(), Duration::hours(TOKEN_TTL_HOURS))
}

/// Verifies signature and expiry against `now` (seconds since the epoch).
pub fn verify_at(token: &str, secret: &[u8], now: i64) -> Result<TokenClaims, TokenError> {
    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) if !h.is_empty() && !c.is_empty() && !s.is_empty() => (h, c, s),
        _ => return Err(TokenError::Malformed),
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| TokenError::Encoding)?;
    let header: Header = serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Claims)?;
    if header.alg != "HS256" {
        return Err(TokenError::Algorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| TokenError::Encoding)?;
    let mut mac = mac(secret)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    // verify_slice compares in constant time
    mac.verify_slice(&signature).map_err(|_| TokenError::Signature)?;

    let claims_bytes = URL_SAFE_NO_PAD.decode(claims_b64).map_err(|_| TokenError::Encoding)?;
    let claims: TokenClaims = serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::Claims)?;
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

pub fn verify(token: &str, secret: &[u8]) -> Result<TokenClaims, TokenError> {
    verify_at(token, secret, Utc::now().timestamp())
}
