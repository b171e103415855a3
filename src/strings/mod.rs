//! The "strings" resource.
//!
//! Resource operations plug in here through the [`Handler`] contract and are
//! mounted under [`MOUNT_PREFIX`]. The echo handler returns the decoded body
//! unchanged.

use async_trait::async_trait;
use axum::http::{Method, StatusCode};

use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::{Handler, HandlerFailure, HandlerResult, RegistryError, RouteRegistry};

/// Prefix every strings route is mounted under.
pub const MOUNT_PREFIX: &str = "/strings";

/// Returns the JSON body it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, request: &Request) -> HandlerResult {
        let body = request
            .json()
            .cloned()
            .ok_or_else(|| HandlerFailure::bad_request("Request body is required"))?;
        Ok(Response::json(StatusCode::OK, body))
    }
}

/// The strings route group, relative to its mount prefix.
pub fn routes() -> Result<RouteRegistry, RegistryError> {
    let mut group = RouteRegistry::new();
    group.register(Method::POST, "/", EchoHandler)?;
    Ok(group)
}

/// Root registry with the strings group mounted at [`MOUNT_PREFIX`].
pub fn registry() -> Result<RouteRegistry, RegistryError> {
    let mut root = RouteRegistry::new();
    root.mount(MOUNT_PREFIX, routes()?)?;
    Ok(root)
}
