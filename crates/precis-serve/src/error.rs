//! Error types for the summarization service and their HTTP mapping.

use std::net::SocketAddr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use precis_core::{ErrorBody, ParamError};
use thiserror::Error;
use tracing::{error, warn};

use crate::backend::BackendError;

/// A request-level failure, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No text provided for summarization")]
    NoText,

    #[error(transparent)]
    InvalidParams(#[from] ParamError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Error generating summary: {0}")]
    Generation(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// A body extractor rejection. Size-limit rejections keep their 413.
    pub fn body_rejection(context: &str, status: StatusCode, detail: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(detail)
        } else {
            Self::BadRequest(format!("{context}: {detail}"))
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoText | Self::InvalidParams(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ModelNotFound(_) | Self::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::ModelNotFound(msg) => Self::ModelNotFound(msg),
            BackendError::Inference(msg) => Self::Generation(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "request rejected");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Failure to bind or run the HTTP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
