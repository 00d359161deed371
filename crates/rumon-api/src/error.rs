use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use rumon_db::constraint::{ConstraintViolation, classify};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Field-level failures from request validation, reported as an array.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Server-side failure outside the database (hashing, token signing).
    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0:#}")]
    Database(#[from] anyhow::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    /// Status and client-facing message. Internal details stay in the log.
    fn public_parts(&self) -> (StatusCode, Value) {
        match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, Value::from(m.as_str())),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, Value::from(m.as_str())),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, Value::from(m.as_str())),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, Value::from(m.as_str())),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, Value::from(m.as_str())),
            ApiError::Validation(msgs) => (StatusCode::BAD_REQUEST, Value::from(msgs.clone())),
            ApiError::Database(err) => {
                let (status, message) = constraint_response(classify(err));
                (status, Value::from(message))
            }
            ApiError::Internal(_) | ApiError::Join(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Value::from(INTERNAL_MESSAGE),
            ),
        }
    }
}

const INTERNAL_MESSAGE: &str = "Internal server error";

fn constraint_response(violation: Option<ConstraintViolation>) -> (StatusCode, &'static str) {
    match violation {
        Some(ConstraintViolation::Unique { table, column }) => {
            let message = match (table.as_str(), column.as_str()) {
                ("users", "email") => "This email is already registered",
                ("users", "phone") => "This phone is already registered",
                ("event_types", "name") => "An event type with this name already exists",
                ("event_invites", _) => "User already invited to this event",
                _ => "Resource already exists",
            };
            (StatusCode::CONFLICT, message)
        }
        Some(ConstraintViolation::ForeignKey) => (StatusCode::BAD_REQUEST, "Related record not found"),
        Some(ConstraintViolation::Other) => (StatusCode::BAD_REQUEST, "Constraint violation"),
        None => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE),
    }
}

/// Uniform error body. `message` is a string, or an array of strings for
/// validation failures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: Value,
    pub error: String,
    pub timestamp: String,
    pub path: String,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: Value, path: &str) -> Self {
        Self {
            status_code: status.as_u16(),
            message,
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            timestamp: rumon_db::queries::now(),
            path: path.to_string(),
        }
    }
}

/// Attached to error responses built from an `ApiError`, so the envelope
/// middleware can fill in the request path and log the internal cause.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: Value,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.public_parts();
        let envelope = ErrorEnvelope::new(status, message.clone(), "");
        let mut response = (status, Json(envelope)).into_response();
        response.extensions_mut().insert(ErrorReport {
            message,
            detail: self.to_string(),
        });
        response
    }
}
