//! The JSON envelope every endpoint answers with, and error → status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use instasync_core::SyncError;

/// `{success, data?, message?, error?}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        })
    }

    pub fn ok_with(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
        })
    }
}

/// HTTP status for a failed operation.
pub fn status_for(err: &SyncError) -> StatusCode {
    match err {
        SyncError::MissingParameter(_) => StatusCode::BAD_REQUEST,
        SyncError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        SyncError::NotFound(_) => StatusCode::NOT_FOUND,
        SyncError::AlreadyRunning => StatusCode::CONFLICT,
        SyncError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler error. Renders as a failure envelope: `error` carries the
/// category, `message` the display text.
#[derive(Debug)]
pub struct ApiError(pub SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        let body = Envelope::<()> {
            success: false,
            data: None,
            message: Some(self.0.to_string()),
            error: Some(self.0.category().to_string()),
        };
        (status, Json(body)).into_response()
    }
}
