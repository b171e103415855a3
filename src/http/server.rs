//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router that hands every request to the dispatcher
//! - Wire up middleware (tracing, request ID, request decompression, panic containment)
//! - Buffer request bodies up to the configured limit
//! - Bound each request by the configured timeout
//! - Bind server to listener and shut down gracefully

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{Request as HttpRequest, State},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    routing::any,
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    decompression::RequestDecompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::error::{panic_detail, PipelineError, INTERNAL_ERROR};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::Dispatcher;
use crate::routing::RouteTable;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_size: usize,
    pub request_timeout: Duration,
}

/// HTTP server for the strings service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and frozen routes.
    pub fn new(config: ServiceConfig, routes: RouteTable) -> Self {
        tracing::info!(routes = routes.len(), "Route table frozen");

        let state = AppState {
            dispatcher: Arc::new(Dispatcher::from_config(&config, routes)),
            max_body_size: config.body.max_body_size,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            // Codings it cannot undo reach the body decoder, which answers 415
            .layer(RequestDecompressionLayer::new().pass_through_unaccepted(true))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &HttpRequest| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri()
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// The fully layered router, for serving or for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Buffers the body and runs the pipeline, both within the request timeout.
async fn dispatch_handler(State(state): State<AppState>, request: HttpRequest) -> HttpResponse {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let head = Request::head_of(&parts);
    let dispatcher = &state.dispatcher;

    let served = tokio::time::timeout(state.request_timeout, async {
        let bytes = read_body(body, state.max_body_size).await?;
        Ok::<_, PipelineError>(dispatcher.dispatch(Request::from_parts(parts, bytes), start).await)
    })
    .await
    .unwrap_or(Err(PipelineError::Timeout));

    match served {
        Ok(response) => response.into_response(),
        Err(error) => dispatcher.reject(&head, error, start).await.into_response(),
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, PipelineError> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        if exceeds_limit(&err) {
            PipelineError::PayloadTooLarge { limit }
        } else {
            PipelineError::BodyRead(err.to_string())
        }
    })
}

fn exceeds_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Last resort for panics outside a handler; handler panics are contained
/// by the dispatcher.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> HttpResponse {
    let detail = panic_detail(panic.as_ref());
    tracing::error!(panic = %detail, "Request panicked outside dispatch");

    Response::error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
}
