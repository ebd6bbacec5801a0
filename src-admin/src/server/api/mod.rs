//! REST API handlers.

pub mod config;

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<Value>);

/// Standard error response.
pub fn err_json(status: u16, message: &str) -> ApiError {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "status": "error", "error": message })),
    )
}
