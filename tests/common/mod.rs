//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use strings_service::config::ServiceConfig;
use strings_service::http::{Request, Response};
use strings_service::routing::{Handler, HandlerFailure, HandlerResult, RouteRegistry, RouteTable};
use strings_service::{strings, HttpServer, Shutdown};
use tokio::net::TcpListener;

/// Counts how often any handler in a test route table ran.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Echo that also counts calls.
struct CountingEcho(CallCounter);

#[async_trait]
impl Handler for CountingEcho {
    async fn handle(&self, request: &Request) -> HandlerResult {
        self.0.hit();
        let body = request
            .json()
            .cloned()
            .ok_or_else(|| HandlerFailure::bad_request("Request body is required"))?;
        Ok(Response::json(StatusCode::OK, body))
    }
}

/// Reports which registration answered.
struct Tagged(&'static str, CallCounter);

#[async_trait]
impl Handler for Tagged {
    async fn handle(&self, request: &Request) -> HandlerResult {
        self.1.hit();
        Ok(Response::json(
            StatusCode::OK,
            json!({ "route": self.0, "id": request.param("id") }),
        ))
    }
}

struct Panics;

/// Outlives any short request timeout.
struct Sleeps(Duration);

#[async_trait]
impl Handler for Sleeps {
    async fn handle(&self, _request: &Request) -> HandlerResult {
        tokio::time::sleep(self.0).await;
        Ok(Response::empty(StatusCode::NO_CONTENT))
    }
}

#[async_trait]
impl Handler for Panics {
    async fn handle(&self, _request: &Request) -> HandlerResult {
        panic!("handler exploded");
    }
}

/// A strings group with overlapping routes, mounted at /strings.
pub fn test_routes(counter: &CallCounter) -> RouteTable {
    let mut group = RouteRegistry::new();
    group
        .register(Method::POST, "/", CountingEcho(counter.clone()))
        .unwrap()
        .register(Method::GET, "/{id}", Tagged("by-id", counter.clone()))
        .unwrap()
        .register(Method::GET, "/count", Tagged("count", counter.clone()))
        .unwrap()
        .register(Method::GET, "/boom/now", Panics)
        .unwrap()
        .register(Method::GET, "/slow/now", Sleeps(Duration::from_secs(3)))
        .unwrap();

    let mut root = RouteRegistry::new();
    root.mount(strings::MOUNT_PREFIX, group).unwrap();
    root.freeze()
}

/// Build an in-process server around the test routes.
pub fn test_server(config: ServiceConfig, counter: &CallCounter) -> HttpServer {
    HttpServer::new(config, test_routes(counter))
}

/// Collect a response body as JSON (or `Value::Null` when empty).
pub async fn json_body(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.expect("read body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    }
}

/// Start the real service on an ephemeral port.
pub async fn spawn_server(config: ServiceConfig, routes: RouteTable) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config, routes);

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}
