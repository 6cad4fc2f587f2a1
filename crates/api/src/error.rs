//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use session::SessionError;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Metrics exporter not installed")]
    MetricsUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(SessionError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::InvalidState { .. } | SessionError::NotStarted) => {
                StatusCode::CONFLICT
            }
            ApiError::Session(SessionError::Device(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Session(SessionError::Storage(_) | SessionError::Task(_))
            | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MetricsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
