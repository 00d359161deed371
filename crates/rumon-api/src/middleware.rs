use axum::{
    Json,
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde_json::Value;
use tracing::{error, warn};

use crate::auth::{AppState, decode_token};
use crate::error::{ApiError, ErrorEnvelope, ErrorReport};

/// Request bodies are JSON documents; anything larger is refused outright.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret", "key", "authorization"];
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "x-api-key"];

/// Extract and validate the bearer JWT; the claims go into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

    let claims = decode_token(&state.jwt_secret, bearer.token())?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Normalizes every error response into an `ErrorEnvelope` and logs it:
/// warn for 4xx, error for 5xx with the (redacted) request attached.
pub async fn error_envelope(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let headers = req.headers().clone();

    let (parts, body) = req.into_parts();
    let body_bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("{} {} rejected: unreadable body: {}", method, path, e);
            let envelope = ErrorEnvelope::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                Value::from("Request body too large"),
                &path,
            );
            return (StatusCode::PAYLOAD_TOO_LARGE, Json(envelope)).into_response();
        }
    };
    let req = Request::from_parts(parts, Body::from(body_bytes.clone()));

    let response = next.run(req).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (message, detail) = match response.extensions().get::<ErrorReport>() {
        Some(report) => (report.message.clone(), report.detail.clone()),
        None => {
            // Framework rejection (bad JSON, bad path param, unknown route):
            // its plain-text body becomes the message.
            let text = match to_bytes(response.into_body(), MAX_BODY_BYTES).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
                Err(_) => String::new(),
            };
            let text = if text.is_empty() {
                status.canonical_reason().unwrap_or("Error").to_string()
            } else {
                text
            };
            (Value::from(text.clone()), text)
        }
    };

    if status.is_server_error() {
        error!(
            status = status.as_u16(),
            %method,
            path = %path,
            query = ?query,
            headers = %redact_headers(&headers),
            body = %redact_body(&body_bytes),
            "Request failed: {}",
            detail
        );
    } else {
        warn!(status = status.as_u16(), %method, path = %path, "{}", detail);
    }

    let envelope = ErrorEnvelope::new(status, message, &path);
    (status, Json(envelope)).into_response()
}

fn redact_headers(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .map(|(name, value)| {
            let shown = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), Value::from(shown))
        })
        .collect::<serde_json::Map<_, _>>();
    Value::Object(map)
}

fn redact_body(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut value) => {
            redact_value(&mut value);
            value
        }
        Err(_) => Value::from(format!("<{} bytes, not JSON>", bytes.len())),
    }
}

/// Blank out every value whose key names a credential, at any depth.
fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                let lower = key.to_lowercase();
                if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                    *inner = Value::from(REDACTED);
                } else {
                    redact_value(inner);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}
