//! Pipeline error types.
//!
//! Every failure the pipeline can hit is turned into a [`Response`] carrying
//! the `{"error": "..."}` envelope, so nothing escapes to the transport as a
//! dropped connection.

use std::any::Any;

use axum::http::StatusCode;
use thiserror::Error;

use crate::http::response::Response;
use crate::routing::handler::HandlerFailure;

/// Message of the fallback 404.
pub const ROUTE_NOT_FOUND: &str = "Route not found";
/// Message of a JSON body that failed to parse.
pub const MALFORMED_BODY: &str = "Malformed JSON body";
/// Message of any 500; panic details stay in the logs.
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Errors surfaced by the dispatch pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Declared JSON body failed to parse.
    #[error("malformed JSON body: {0}")]
    MalformedBody(String),

    /// JSON body declared in a charset other than UTF-8.
    #[error("unsupported charset \"{0}\"")]
    UnsupportedCharset(String),

    /// Body sent with a content coding that could not be undone.
    #[error("unsupported content encoding \"{0}\"")]
    UnsupportedEncoding(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// No route entry matched the method and path.
    #[error("no route for {method} {path}")]
    NoMatch { method: String, path: String },

    #[error(transparent)]
    Handler(#[from] HandlerFailure),

    #[error("handler panicked: {0}")]
    HandlerPanic(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            PipelineError::UnsupportedCharset(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PipelineError::UnsupportedEncoding(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PipelineError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::BodyRead(_) => StatusCode::BAD_REQUEST,
            PipelineError::NoMatch { .. } => StatusCode::NOT_FOUND,
            PipelineError::Handler(failure) => failure.status(),
            PipelineError::HandlerPanic(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Short machine-readable name, used for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MalformedBody(_) => "malformed_body",
            PipelineError::UnsupportedCharset(_) => "unsupported_charset",
            PipelineError::UnsupportedEncoding(_) => "unsupported_encoding",
            PipelineError::PayloadTooLarge { .. } => "payload_too_large",
            PipelineError::BodyRead(_) => "body_read",
            PipelineError::NoMatch { .. } => "no_match",
            PipelineError::Handler(_) => "handler_failure",
            PipelineError::HandlerPanic(_) => "handler_panic",
            PipelineError::Timeout => "timeout",
        }
    }

    /// Message placed in the error envelope.
    ///
    /// Parser details stay in the logs; callers get a fixed message.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::MalformedBody(_) => MALFORMED_BODY.to_string(),
            PipelineError::UnsupportedCharset(charset) => {
                format!("Unsupported charset \"{}\"", charset.to_uppercase())
            }
            PipelineError::UnsupportedEncoding(encoding) => {
                format!("Unsupported content encoding \"{}\"", encoding)
            }
            PipelineError::PayloadTooLarge { .. } => "Request body too large".to_string(),
            PipelineError::BodyRead(_) => "Failed to read request body".to_string(),
            PipelineError::NoMatch { .. } => ROUTE_NOT_FOUND.to_string(),
            PipelineError::Handler(failure) => failure.message().to_string(),
            PipelineError::HandlerPanic(_) => INTERNAL_ERROR.to_string(),
            PipelineError::Timeout => "Request timeout".to_string(),
        }
    }

    pub fn into_response(self) -> Response {
        Response::error(self.status(), &self.public_message())
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_detail(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string())
}
