//! Request model seen by the pipeline and by resource handlers.
//!
//! # Responsibilities
//! - Capture method, path, query, headers and the buffered body
//! - Carry the decoded JSON body once the body decoder has run
//! - Carry path parameters bound by the route table
//!
//! # Design Decisions
//! - Body is buffered before dispatch so decoding is synchronous
//! - Only the pipeline can fill in the decoded body and parameters

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::routing::handler::HandlerFailure;

/// Named path parameters, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    json: Option<Value>,
    params: PathParams,
}

impl Request {
    /// Create a request for `target`, which may carry a `?query` suffix.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            json: None,
            params: PathParams::new(),
        }
    }

    /// Assemble a request from transport parts and the buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
            json: None,
            params: PathParams::new(),
        }
    }

    /// A bodiless copy of the request line and headers, kept for answering
    /// a request whose body was never fully read.
    pub fn head_of(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            body: Bytes::new(),
            json: None,
            params: PathParams::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty path segments, still percent-encoded.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is visible ASCII.
    pub fn header(&self, name: impl axum::http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn raw_body(&self) -> &Bytes {
        &self.body
    }

    /// The decoded JSON body, present only for JSON requests that parsed.
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Deserialize the decoded body into `T`.
    ///
    /// A missing body or a body of the wrong shape is a 400 failure.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HandlerFailure> {
        let value = self
            .json
            .as_ref()
            .ok_or_else(|| HandlerFailure::bad_request("Request body is required"))?;
        T::deserialize(value).map_err(|e| HandlerFailure::bad_request(e.to_string()))
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub(crate) fn set_json(&mut self, value: Value) {
        self.json = Some(value);
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }
}
