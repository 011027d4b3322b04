use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{ensure_valid, AppError, AppResult};
use crate::middleware::auth::VerifiedClaims;
use crate::middleware::validation::validate_login_data;
use crate::routes::ApiJson;
use crate::state::AppState;
use crate::token;
use crate::types::{CallerIdentity, LoginResponse, VerifyResponse};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Stable subject id for an admin account: the first 12 bytes of the
/// SHA-256 of its email, hex encoded.
pub fn subject_id_for(email: &str) -> String {
    let digest = Sha256::digest(email.as_bytes());
    hex::encode(&digest[..12])
}

fn password_matches(password: &str, expected_sha256_hex: &str) -> bool {
    let Ok(expected) = hex::decode(expected_sha256_hex) else {
        return false;
    };
    let provided = Sha256::digest(password.as_bytes());
    provided.as_slice().ct_eq(&expected).into()
}

pub async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> AppResult<Json<LoginResponse>> {
    let errors = validate_login_data(&body);
    if !errors.is_empty() {
        state.metrics.inc_validation_failures();
    }
    ensure_valid(errors)?;

    // Validated above: both are non-empty strings.
    let email = body["email"].as_str().unwrap_or_default().to_lowercase();
    let password = body["password"].as_str().unwrap_or_default();

    let auth = &state.config.auth;
    let email_ok = email == auth.admin_email.to_lowercase();
    let password_ok = password_matches(password, &auth.admin_password_sha256);
    if !(email_ok && password_ok) {
        tracing::warn!("Failed login attempt");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let identity = CallerIdentity { subject_id: subject_id_for(&email), email: email.clone() };
    let token = token::issue_at(
        &identity,
        auth.jwt_secret.as_bytes(),
        Utc::now().timestamp(),
        chrono::Duration::hours(auth.token_ttl_hours),
    )
    .map_err(|e| AppError::Internal(e.into()))?;

    tracing::info!(subject = %identity.subject_id, "Admin logged in");
    Ok(Json(LoginResponse { token, email }))
}

pub async fn verify(VerifiedClaims(admin): VerifiedClaims) -> Json<VerifyResponse> {
    Json(VerifyResponse { valid: true, admin })
}
