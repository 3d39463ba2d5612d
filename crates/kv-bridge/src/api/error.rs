//! API error types and responses
//!
//! Every error renders as a short plain-text body. Backend causes are logged
//! where they happen and never copied into the response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::StorageError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Unsupported media type")]
    UnsupportedMediaType,

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("403 Forbidden")]
    Forbidden,

    #[error("Backend error: {0}")]
    Backend(#[from] StorageError),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error reflects a fault on our side rather than the client's
    pub fn is_server_fault(&self) -> bool {
        matches!(self, ApiError::Backend(_))
    }

    fn body(&self) -> String {
        match self {
            ApiError::Backend(_) => "500 Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = self.body();
        body.push('\n');
        (self.status(), body).into_response()
    }
}
