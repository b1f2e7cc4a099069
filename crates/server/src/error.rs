use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
///
/// The `Display` text of each variant is what the client sees, so engine
/// details never go into it. [`ServerError::Processing`] keeps the underlying
/// error only for logging.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("No image provided")]
    NoImage,

    #[error("Invalid image format. Must be base64 encoded image with data URI scheme")]
    InvalidImageFormat,

    #[error("OCR service is initializing. Please try again in a few seconds")]
    NotReady,

    #[error("Error processing image")]
    Processing(#[source] ocrd::OcrError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Not found")]
    NotFound,
}

/// Failure envelope shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NoImage | ServerError::InvalidImageFormat | ServerError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Outcome label used for request metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            ServerError::NoImage => "no_image",
            ServerError::InvalidImageFormat => "invalid_format",
            ServerError::NotReady => "not_ready",
            ServerError::Processing(_) => "processing_error",
            ServerError::BadRequest(_) => "bad_request",
            ServerError::PayloadTooLarge => "payload_too_large",
            ServerError::NotFound => "not_found",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::Processing(err) = &self {
            tracing::error!(error = %err, "OCR processing failed");
        }

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });

        (self.status_code(), body).into_response()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ServerError::PayloadTooLarge;
        }
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<ocrd::OcrError> for ServerError {
    fn from(err: ocrd::OcrError) -> Self {
        match err {
            ocrd::OcrError::InvalidDataUri => ServerError::InvalidImageFormat,
            ocrd::OcrError::NotReady => ServerError::NotReady,
            other => ServerError::Processing(other),
        }
    }
}
