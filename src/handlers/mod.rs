pub mod orders;
pub mod pool;
pub mod progress_ws;
pub mod sync;

use axum::Json;
use axum::http::StatusCode;

use crate::error::BridgeError;
use crate::models::common::ErrorResponse;

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn bridge_error(error: BridgeError) -> ApiError {
    let status = match &error {
        BridgeError::JobNotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::QueueFull | BridgeError::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::LockTimeout { .. } | BridgeError::FastPathActive(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub(crate) fn unknown_domain(raw: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("unknown sync domain: {}", raw),
        }),
    )
}
