use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::error::Error;
use std::fmt;

/// A single field-level validation violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// The primary error type for the application.
///
/// The first four variants are the error kinds the middleware pipeline can
/// produce. The remaining ones are raised by the route handlers behind it.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed, invalid or expired credential. The message is sent
    /// to the caller as-is and must never reveal which check failed.
    Unauthorized(String),
    /// Too many requests for one client/path key within the current window.
    RateLimited {
        /// The number of seconds until the window for the key resets.
        retry_after_seconds: u64,
    },
    /// One or more payload fields failed validation. Always the full list.
    Validation(Vec<FieldError>),
    /// Anything unexpected. Logged server-side, reported generically.
    Internal(anyhow::Error),
    /// For client errors that are not field-level violations.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For methods a route does not serve.
    MethodNotAllowed,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::RateLimited { retry_after_seconds } => {
                write!(f, "Rate limited. Retry after {} seconds", retry_after_seconds)
            }
            AppError::Validation(errors) => {
                write!(f, "Validation failed for {} field(s)", errors.len())
            }
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::MethodNotAllowed => write!(f, "Method not allowed"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = match self {
            AppError::Unauthorized(msg) => json!({ "code": "UNAUTHORIZED", "message": msg }),
            AppError::RateLimited { retry_after_seconds } => json!({
                "code": "RATE_LIMITED",
                "message": "Too many requests, please try again later",
                "retry_after_seconds": retry_after_seconds,
            }),
            AppError::Validation(errors) => json!({
                "code": "VALIDATION_ERROR",
                "message": "Validation failed",
                "errors": errors,
            }),
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                json!({
                    "code": "INTERNAL_ERROR",
                    "message": "Internal server error",
                    "error_id": error_id.to_string(),
                })
            }
            AppError::BadRequest(msg) => json!({ "code": "BAD_REQUEST", "message": msg }),
            AppError::NotFound(msg) => json!({ "code": "NOT_FOUND", "message": msg }),
            AppError::MethodNotAllowed => {
                json!({ "code": "METHOD_NOT_ALLOWED", "message": "Method not allowed" })
            }
        };

        body["status"] = json!(status.as_u16());
        body["timestamp"] = json!(chrono::Utc::now().to_rfc3339());

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<Vec<FieldError>> for AppError {
    fn from(errors: Vec<FieldError>) -> Self {
        AppError::Validation(errors)
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// Turns an aggregate validation result into a `Validation` error when any
/// violation was found.
pub fn ensure_valid(errors: Vec<FieldError>) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
