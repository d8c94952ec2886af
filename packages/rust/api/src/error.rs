use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use contentpub_shared::PublishError;

/// A [`PublishError`] rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub PublishError);

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = if self.0.is_unexpected() {
            error!(error = %self.0, "unhandled error");
            json!({"error": "Unhandled server error", "detail": self.0.to_string()})
        } else {
            if status.is_server_error() {
                warn!(status = status.as_u16(), error = %self.0, "request failed");
            }
            json!({"error": self.0.to_string()})
        };

        (status, Json(body)).into_response()
    }
}
