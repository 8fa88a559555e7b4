//! HTTP rendering of [`sl_core::Error`].
//!
//! Handlers return `Result<T, ApiError>`; the newtype exists because
//! `IntoResponse` cannot be implemented for a foreign type directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub struct ApiError(sl_core::Error);

impl From<sl_core::Error> for ApiError {
    fn from(e: sl_core::Error) -> Self {
        Self(e)
    }
}

/// Stable machine-readable code for each error class. Clients match on
/// this, not on the message text.
fn error_code(err: &sl_core::Error) -> &'static str {
    match err {
        sl_core::Error::NotFound { .. } => "not_found",
        sl_core::Error::Validation(_) => "validation_error",
        sl_core::Error::Store(_) => "store_error",
        sl_core::Error::Io(_) => "io_error",
        sl_core::Error::Tool { .. } => "tool_error",
        sl_core::Error::Probe(_) => "probe_error",
        sl_core::Error::Internal(_) => "internal_error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // 5xx means something on our side broke; keep a log trail.
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": error_code(&self.0),
        });
        (status, axum::Json(body)).into_response()
    }
}
