//! HTTP error mapping
//!
//! Every failure leaves the service as `{"error": "<message>"}` with a
//! status derived from the common error taxonomy.

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Common(#[from] examhub_common::Error),

    /// Unparseable JSON body
    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),

    /// Malformed multipart body
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    /// Path segment that does not parse (usually a malformed id)
    #[error("Invalid path: {0}")]
    Path(#[from] PathRejection),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::Common(examhub_common::Error::NotFound(msg.into()))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Common(examhub_common::Error::Validation(msg.into()))
    }

    pub fn status(&self) -> StatusCode {
        use examhub_common::Error;

        match self {
            ApiError::Common(err) => match err {
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Conflict(_) => StatusCode::CONFLICT,
                Error::Validation(_) | Error::InvalidReference(_) => StatusCode::BAD_REQUEST,
                Error::Upstream(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Json(_) | ApiError::Multipart(_) | ApiError::Path(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Common(err) => err.message(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

/// `Json` extractor whose rejection is reported as an `ApiError`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl<T: Serialize> IntoResponse for JsonBody<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// `Path` extractor whose rejection is reported as an `ApiError`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParams<T>(pub T);
