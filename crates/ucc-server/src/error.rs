//! Maps `UccError` to HTTP status codes and JSON error bodies, mirroring
//! `sem_os_server::error::AppError`'s wrapper-newtype pattern.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use ucc_core::error::UccError;

pub struct AppError(pub UccError);

impl From<UccError> for AppError {
    fn from(e: UccError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error serving request");
        }
        let body = json!({
            "error": self.0.to_string(),
            "reason": self.0.failure_reason(),
            "code": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
