//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use campaign_core::AppError;
use campaign_core::error::ErrorKind;

use crate::dto::response::ErrorResponse;

/// Handler error. Every failure of the control API is a 500 with an
/// `{"error": message}` body, whatever its kind.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match err.kind {
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict => {
                tracing::warn!(kind = %err.kind, error = %err.message, "Request rejected");
            }
            _ => tracing::error!(kind = %err.kind, error = %err.message, "Request failed"),
        }

        let body = ErrorResponse { error: err.message };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
