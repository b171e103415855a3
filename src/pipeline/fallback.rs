//! Fallback responder for unmatched requests.

use crate::http::error::PipelineError;
use crate::http::request::Request;
use crate::http::response::Response;

/// The fixed 404 returned when no route matched.
pub fn not_found(request: &Request) -> Response {
    tracing::debug!(method = %request.method(), path = %request.path(), "No route matched");
    PipelineError::NoMatch {
        method: request.method().to_string(),
        path: request.path().to_string(),
    }
    .into_response()
}
