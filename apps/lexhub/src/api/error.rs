//! Hub errors as HTTP responses.

use super::types::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lexhub_core::HubError;

/// Status code for an error kind.
#[must_use]
pub fn status_for(error: &HubError) -> StatusCode {
    match error {
        HubError::EntityNotRegistered(_)
        | HubError::ModuleNotRegistered(_)
        | HubError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
        HubError::UnsupportedOperation(_)
        | HubError::InvalidQuery(_)
        | HubError::InvalidMutation(_)
        | HubError::InvalidSchema(_) => StatusCode::BAD_REQUEST,
        HubError::PermissionDenied => StatusCode::FORBIDDEN,
        HubError::DuplicateRecord { .. } => StatusCode::CONFLICT,
        HubError::InvalidReference { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        HubError::Storage(_)
        | HubError::Serialization(_)
        | HubError::CacheUnavailable(_)
        | HubError::PrefetchFailed(_)
        | HubError::NotifyFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler error wrapper.
#[derive(Debug)]
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(error: HubError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "request failed");
        }
        (status, Json(ErrorResponse::from_error(&self.0))).into_response()
    }
}
