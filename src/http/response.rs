//! Response model produced by pipeline stages and handlers.
//!
//! # Responsibilities
//! - Hold status, headers and a JSON, raw or empty body
//! - Merge cross-origin headers after the producing stage is done
//! - Convert into an axum response at the transport boundary
//!
//! # Design Decisions
//! - Fields are private: a produced response is only read, never edited,
//!   except for the dispatcher's header merge
//! - JSON bodies stay structured until the transport serializes them

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Bytes(Bytes),
}

/// The single response produced for a request.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    /// A response with no body.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    /// A JSON response.
    pub fn json(status: StatusCode, value: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body: ResponseBody::Json(value),
        }
    }

    /// A raw response with an explicit content type.
    pub fn bytes(status: StatusCode, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type);
        Self {
            status,
            headers,
            body: ResponseBody::Bytes(body.into()),
        }
    }

    /// A plain-text response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::bytes(
            status,
            HeaderValue::from_static("text/plain; charset=utf-8"),
            body.into(),
        )
    }

    /// The uniform `{"error": "..."}` envelope.
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Merge headers computed outside the producing stage.
    ///
    /// `Vary` values accumulate; every other header replaces what the
    /// producing stage set.
    pub(crate) fn merge_headers(mut self, extra: &HeaderMap) -> Self {
        for name in extra.keys() {
            if name == header::VARY {
                for value in extra.get_all(name) {
                    self.headers.append(name.clone(), value.clone());
                }
            } else {
                self.headers.remove(name);
                for value in extra.get_all(name) {
                    self.headers.append(name.clone(), value.clone());
                }
            }
        }
        self
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = match self.body {
            ResponseBody::Empty => Body::empty().into_response(),
            ResponseBody::Json(value) => Json(value).into_response(),
            ResponseBody::Bytes(bytes) => Body::from(bytes).into_response(),
        };
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}
