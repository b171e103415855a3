//! Request dispatcher.
//!
//! # Responsibilities
//! - Run the declared stages in order for one request
//! - Stop at the first stage that produces a response
//! - Invoke the fallback responder when routing finds nothing
//! - Merge cross-origin headers into whatever response was produced
//!
//! # Design Decisions
//! - Exactly one response per request, whichever stage produces it
//! - The route table is frozen before the dispatcher is built
//! - Handler failures are serialized, never reinterpreted
//! - A panicking handler is contained here so its 500 still gets the
//!   cross-origin headers

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::http::HeaderMap;
use futures_util::FutureExt;

use crate::config::ServiceConfig;
use crate::http::error::{panic_detail, PipelineError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::observability::metrics;
use crate::pipeline::body::BodyDecoder;
use crate::pipeline::fallback;
use crate::pipeline::stage::{DispatchState, Flow, Stage, Terminal, PIPELINE};
use crate::routing::{RouteMatch, RouteTable};
use crate::security::cors::{CorsOutcome, CorsPolicy};

/// Outcome of a traced dispatch.
#[derive(Debug)]
pub struct Dispatch {
    pub response: Response,
    /// States visited, starting at `Start` and ending at `Responded`.
    pub trace: Vec<DispatchState>,
    pub terminal: Terminal,
}

/// Runs the pipeline for each request.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    cors: CorsPolicy,
    decoder: BodyDecoder,
    routes: RouteTable,
}

impl Dispatcher {
    pub fn new(cors: CorsPolicy, decoder: BodyDecoder, routes: RouteTable) -> Self {
        Self {
            cors,
            decoder,
            routes,
        }
    }

    pub fn from_config(config: &ServiceConfig, routes: RouteTable) -> Self {
        Self::new(
            CorsPolicy::from_config(&config.cors),
            BodyDecoder::from_config(&config.body),
            routes,
        )
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Dispatch a request and record its outcome. `start` is when the
    /// request arrived, before its body was read.
    pub async fn dispatch(&self, request: Request, start: Instant) -> Response {
        let method = request.method().clone();
        let path = request.path().to_string();

        let Dispatch {
            response, terminal, ..
        } = self.dispatch_traced(request).await;

        tracing::debug!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            terminal = terminal.as_str(),
            "Request dispatched"
        );
        metrics::record_request(method.as_str(), response.status().as_u16(), terminal.as_str(), start);

        response
    }

    /// Dispatch a request, reporting the states it went through.
    pub async fn dispatch_traced(&self, mut request: Request) -> Dispatch {
        let mut trace = vec![DispatchState::Start];
        let mut cors_headers = HeaderMap::new();

        for stage in PIPELINE {
            let flow = match stage {
                Stage::CrossOrigin => match self.cors.evaluate(&request).await {
                    CorsOutcome::Preflight(response) => Flow::Respond(response, Terminal::Preflight),
                    CorsOutcome::Continue(headers) => {
                        cors_headers = headers;
                        Flow::Continue
                    }
                },
                Stage::BodyDecoder => match self.decoder.decode(&mut request) {
                    Ok(()) => Flow::Continue,
                    Err(error) => {
                        tracing::debug!(path = %request.path(), error = %error, "Request body rejected");
                        Flow::Respond(error.into_response(), Terminal::BodyRejected)
                    }
                },
                Stage::Routing => self.route(&mut request).await,
            };

            // A preflight ends the pipeline before the origin check completes
            if !matches!(flow, Flow::Respond(_, Terminal::Preflight)) {
                trace.push(stage.completed_state());
            }

            if let Flow::Respond(response, terminal) = flow {
                return finish(response, &cors_headers, trace, terminal);
            }
        }

        finish(
            fallback::not_found(&request),
            &cors_headers,
            trace,
            Terminal::Fallback,
        )
    }

    /// Answer a request that failed outside the stages: an unreadable or
    /// oversized body, or a timeout. `request` carries no body.
    pub async fn reject(&self, request: &Request, error: PipelineError, start: Instant) -> Response {
        tracing::warn!(
            method = %request.method(),
            path = %request.path(),
            error = %error,
            "Request rejected"
        );
        let outcome = error.kind();
        let response = error
            .into_response()
            .merge_headers(&self.cors.response_headers(request).await);
        metrics::record_request(
            request.method().as_str(),
            response.status().as_u16(),
            outcome,
            start,
        );
        response
    }

    async fn route(&self, request: &mut Request) -> Flow {
        let Some(RouteMatch { entry, params }) = self.routes.lookup(request) else {
            return Flow::Continue;
        };

        request.set_params(params);
        tracing::debug!(
            method = %request.method(),
            pattern = entry.pattern(),
            "Route matched"
        );

        let handled = AssertUnwindSafe(entry.handler().handle(request))
            .catch_unwind()
            .await;

        match handled {
            Ok(Ok(response)) => Flow::Respond(response, Terminal::Handler),
            Ok(Err(failure)) => {
                tracing::warn!(
                    pattern = entry.pattern(),
                    status = failure.status().as_u16(),
                    error = %failure,
                    "Handler failed"
                );
                Flow::Respond(
                    PipelineError::from(failure).into_response(),
                    Terminal::HandlerFailure,
                )
            }
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                tracing::error!(pattern = entry.pattern(), panic = %detail, "Handler panicked");
                Flow::Respond(
                    PipelineError::HandlerPanic(detail).into_response(),
                    Terminal::HandlerPanic,
                )
            }
        }
    }
}

fn finish(
    response: Response,
    cors_headers: &HeaderMap,
    mut trace: Vec<DispatchState>,
    terminal: Terminal,
) -> Dispatch {
    trace.push(DispatchState::Responded);
    Dispatch {
        response: response.merge_headers(cors_headers),
        trace,
        terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use ::metrics::{
        Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString,
        Unit,
    };

    use async_trait::async_trait;
    use axum::http::{header, HeaderValue, Method, StatusCode};
    use serde_json::json;

    use crate::http::response::ResponseBody;
    use crate::routing::{Handler, HandlerFailure, HandlerResult, RouteRegistry};

    /// Keeps every histogram sample.
    #[derive(Default)]
    struct Samples(Mutex<Vec<f64>>);

    impl HistogramFn for Samples {
        fn record(&self, value: f64) {
            self.0.lock().unwrap().push(value);
        }
    }

    #[derive(Default)]
    struct LatencyRecorder(Arc<Samples>);

    impl Recorder for LatencyRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::from_arc(self.0.clone())
        }
    }

    /// Echoes the decoded body and counts invocations.
    #[derive(Clone, Default)]
    struct Probe {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for Probe {
        async fn handle(&self, request: &Request) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = request.json().cloned().unwrap_or(json!(null));
            Ok(Response::json(StatusCode::OK, json!({
                "body": body,
                "params": request.params().iter().collect::<Vec<_>>(),
            })))
        }
    }

    struct Failing;

    struct Exploding;

    #[async_trait]
    impl Handler for Exploding {
        async fn handle(&self, _request: &Request) -> HandlerResult {
            panic!("handler exploded");
        }
    }

    #[async_trait]
    impl Handler for Failing {
        async fn handle(&self, _request: &Request) -> HandlerResult {
            Err(HandlerFailure::unprocessable("value must not be empty"))
        }
    }

    fn dispatcher(probe: &Probe) -> Dispatcher {
        let mut strings = RouteRegistry::new();
        strings
            .register(Method::POST, "/", probe.clone())
            .unwrap()
            .register(Method::GET, "/{id}", probe.clone())
            .unwrap()
            .register(Method::DELETE, "/{id}", Failing)
            .unwrap()
            .register(Method::PATCH, "/{id}", Exploding)
            .unwrap();
        let mut root = RouteRegistry::new();
        root.mount("/strings", strings).unwrap();
        Dispatcher::new(CorsPolicy::default(), BodyDecoder::default(), root.freeze())
    }

    fn json_post(path: &str, body: &'static str) -> Request {
        Request::new(Method::POST, path)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body)
    }

    #[tokio::test]
    async fn test_full_path_through_handler() {
        let probe = Probe::default();
        let out = dispatcher(&probe)
            .dispatch_traced(json_post("/strings", r#"{"value":"abc"}"#))
            .await;

        assert_eq!(out.terminal, Terminal::Handler);
        assert_eq!(
            out.trace,
            vec![
                DispatchState::Start,
                DispatchState::CorsChecked,
                DispatchState::BodyDecoded,
                DispatchState::Routed,
                DispatchState::Responded,
            ]
        );
        assert_eq!(
            out.response.body(),
            &ResponseBody::Json(json!({"body": {"value": "abc"}, "params": []}))
        );
        assert_eq!(
            out.response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let probe = Probe::default();
        let req = Request::new(Method::OPTIONS, "/strings/any").with_header(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        );
        let out = dispatcher(&probe).dispatch_traced(req).await;

        assert_eq!(out.terminal, Terminal::Preflight);
        assert_eq!(out.trace, vec![DispatchState::Start, DispatchState::Responded]);
        assert!(out.response.status().is_success());
        assert_eq!(out.response.body(), &ResponseBody::Empty);
        assert!(out.response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_never_reaches_handler() {
        let probe = Probe::default();
        let out = dispatcher(&probe).dispatch_traced(json_post("/strings", "{")).await;

        assert_eq!(out.terminal, Terminal::BodyRejected);
        assert_eq!(
            out.trace,
            vec![
                DispatchState::Start,
                DispatchState::CorsChecked,
                DispatchState::BodyDecoded,
                DispatchState::Responded,
            ]
        );
        assert_eq!(out.response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            out.response.body(),
            &ResponseBody::Json(json!({"error": "Malformed JSON body"}))
        );
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_carries_cors_headers() {
        let probe = Probe::default();
        let out = dispatcher(&probe)
            .dispatch_traced(Request::new(Method::GET, "/unknown/path"))
            .await;

        assert_eq!(out.terminal, Terminal::Fallback);
        assert_eq!(*out.trace.last().unwrap(), DispatchState::Responded);
        assert!(out.trace.contains(&DispatchState::Routed));
        assert_eq!(out.response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            out.response.body(),
            &ResponseBody::Json(json!({"error": "Route not found"}))
        );
        assert_eq!(
            out.response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_params_bound_for_handler() {
        let probe = Probe::default();
        let resp = dispatcher(&probe)
            .dispatch(Request::new(Method::GET, "/strings/hello%21"), Instant::now())
            .await;
        assert_eq!(
            resp.body(),
            &ResponseBody::Json(json!({"body": null, "params": [["id", "hello!"]]}))
        );
    }

    #[tokio::test]
    async fn test_handler_failure_enveloped() {
        let probe = Probe::default();
        let out = dispatcher(&probe)
            .dispatch_traced(Request::new(Method::DELETE, "/strings/abc"))
            .await;

        assert_eq!(out.terminal, Terminal::HandlerFailure);
        assert_eq!(out.response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            out.response.body(),
            &ResponseBody::Json(json!({"error": "value must not be empty"}))
        );
        assert!(out.response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_wrong_method_falls_back() {
        let probe = Probe::default();
        let resp = dispatcher(&probe)
            .dispatch(Request::new(Method::PUT, "/strings"), Instant::now())
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reject_merges_cors_headers() {
        let probe = Probe::default();
        let req = Request::new(Method::POST, "/strings");
        let resp = dispatcher(&probe)
            .reject(&req, PipelineError::PayloadTooLarge { limit: 10 }, Instant::now())
            .await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");

        let resp = dispatcher(&probe)
            .reject(&req, PipelineError::Timeout, Instant::now())
            .await;
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(resp.body(), &ResponseBody::Json(json!({"error": "Request timeout"})));
        assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }

    #[tokio::test]
    async fn test_handler_panic_contained() {
        let probe = Probe::default();
        let out = dispatcher(&probe)
            .dispatch_traced(Request::new(Method::PATCH, "/strings/abc"))
            .await;

        assert_eq!(out.terminal, Terminal::HandlerPanic);
        assert_eq!(*out.trace.last().unwrap(), DispatchState::Responded);
        assert_eq!(out.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            out.response.body(),
            &ResponseBody::Json(json!({"error": "Internal server error"}))
        );
        assert_eq!(
            out.response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[test]
    fn test_latency_measured_from_arrival() {
        let probe = Probe::default();
        let dispatcher = dispatcher(&probe);
        let arrived = Instant::now()
            .checked_sub(Duration::from_millis(1500))
            .expect("clock too close to boot");
        let recorder = LatencyRecorder::default();

        ::metrics::with_local_recorder(&recorder, || {
            let req = Request::new(Method::POST, "/strings");
            dispatcher
                .reject(&req, PipelineError::Timeout, arrived)
                .now_or_never()
                .expect("reject completes without waiting");
            dispatcher
                .dispatch(Request::new(Method::GET, "/unknown"), arrived)
                .now_or_never()
                .expect("fallback completes without waiting");
        });

        let samples = recorder.0.0.lock().unwrap().clone();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|secs| *secs >= 1.5), "{:?}", samples);
    }
}
