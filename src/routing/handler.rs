//! Resource handler contract.
//!
//! A handler receives the fully assembled request (decoded body, bound path
//! parameters, headers) and produces either a [`Response`] or a
//! [`HandlerFailure`]. Handlers never set cross-origin headers; the
//! dispatcher merges those afterwards.

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::http::request::Request;
use crate::http::response::Response;

/// A failure reported by a resource handler.
///
/// The status is always a client or server error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerFailure {
    status: StatusCode,
    message: String,
}

impl HandlerFailure {
    /// Create a failure. Non-error statuses are reported as 500.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let status = if status.is_client_error() || status.is_server_error() {
            status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type HandlerResult = Result<Response, HandlerFailure>;

/// A resource operation bound to a route.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, request: &Request) -> HandlerResult;
}

/// Adapts a synchronous closure into a [`Handler`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
{
    async fn handle(&self, request: &Request) -> HandlerResult {
        (self.0)(request)
    }
}
