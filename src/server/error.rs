use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::{Error, ErrorKind};

/// Error returned to HTTP callers
///
/// Processing failures are collapsed into `Internal` so no file paths or
/// parser details leave the server; the full error is logged instead.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to process the request")]
    Internal,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Internal => ErrorKind::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest(message) => ApiError::InvalidRequest(message),
            Error::NotFound(message) => ApiError::NotFound(message),
            other => {
                error!("Request failed: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": {
                "kind": self.kind().as_str(),
                "message": self.to_string(),
            },
        });

        (self.status(), Json(body)).into_response()
    }
}
