use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use brickbot_core::errors::InterfaceError;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

pub fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Renders an interface error without leaking internal detail to the caller.
pub fn interface_error(error: InterfaceError) -> Response {
    let body = ErrorBody {
        error: error.kind(),
        message: error.user_message().to_string(),
        correlation_id: error.correlation_id().to_string(),
    };
    (status_for(&error), Json(body)).into_response()
}

pub fn unauthorized(correlation_id: &str) -> Response {
    let body = ErrorBody {
        error: "unauthorized",
        message: "A valid bearer token is required.".to_string(),
        correlation_id: correlation_id.to_string(),
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Caller-supplied correlation id, or a fresh one.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// True when no token is configured or the request presents the configured one.
pub fn authorized(headers: &HeaderMap, expected: Option<&SecretString>) -> bool {
    expected.map_or(true, |expected| bearer_matches(headers, expected))
}

pub fn bearer_matches(headers: &HeaderMap, expected: &SecretString) -> bool {
    let Some(presented) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return false;
    };
    constant_time_eq(presented.trim().as_bytes(), expected.expose_secret().as_bytes())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
