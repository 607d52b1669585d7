//! HTTP error rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mailshot_common::Error;
use mailshot_core::DispatchError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error; renders as [`ErrorResponse`] with the mapped status
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Internal details stay in the log
        let message = if status.is_server_error() {
            error!("Request failed: {}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorResponse {
            error: self.0.code().to_lowercase(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
