use super::state::AppState;
use crate::channel::{ChannelError, MethodCall};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MethodResponse {
    pub result: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<ChannelError> for ErrorResponse {
    fn from(err: ChannelError) -> Self {
        Self {
            code: err.code,
            message: err.message,
        }
    }
}

fn status_for(code: &str) -> StatusCode {
    match code {
        "ALREADY_RECORDING" | "NOT_RECORDING" => StatusCode::CONFLICT,
        ChannelError::NOT_IMPLEMENTED => StatusCode::NOT_FOUND,
        ChannelError::INVALID_ARGUMENTS | "UNSUPPORTED_FORMAT" => StatusCode::BAD_REQUEST,
        "DEVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /channel/:method
/// Invoke a recorder method; the body (possibly empty) holds its arguments
pub async fn invoke_method(
    State(state): State<AppState>,
    Path(method): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let arguments = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Rejecting '{}' call with malformed body: {}", method, e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        code: ChannelError::INVALID_ARGUMENTS.to_string(),
                        message: format!("Malformed JSON body: {}", e),
                    }),
                )
                    .into_response();
            }
        }
    };

    match state.channel.handle(MethodCall::new(method.clone(), arguments)).await {
        Ok(result) => {
            info!("Method '{}' completed", method);
            (StatusCode::OK, Json(MethodResponse { result })).into_response()
        }
        Err(e) => {
            let status = status_for(&e.code);
            if status.is_server_error() {
                error!("Method '{}' failed: {}", method, e);
            } else {
                warn!("Method '{}' rejected: {}", method, e);
            }
            (status, Json(ErrorResponse::from(e))).into_response()
        }
    }
}

/// GET /status
/// Current recorder state and active session, if any
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.channel.recorder().status().await;
    (StatusCode::OK, Json(status))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(status_for("NOT_RECORDING"), StatusCode::CONFLICT);
        assert_eq!(status_for("ALREADY_RECORDING"), StatusCode::CONFLICT);
        assert_eq!(status_for("NOT_IMPLEMENTED"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("INVALID_ARGUMENTS"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("DEVICE_UNAVAILABLE"), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for("CAPTURE_FAILED"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for("IO_ERROR"), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
