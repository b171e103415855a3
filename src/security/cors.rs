//! Cross-origin policy filter.
//!
//! # Responsibilities
//! - Decide whether the request origin is permitted
//! - Answer preflight requests without touching the route table
//! - Compute the headers merged into every other response
//!
//! # Design Decisions
//! - The policy is a `tower_http` [`CorsLayer`] wrapped around a pass-through
//!   service; a preflight is the layer answering on its own
//! - Missing `Origin` is not an error, just not a cross-origin request
//! - Under the permit-all policy `*` is sent even without `Origin`
//! - Disallowed origins get no allow headers; the browser enforces the rest

use std::convert::Infallible;
use std::fmt;
use std::future::{ready, Ready};
use std::time::Duration;

use axum::http::{
    header, HeaderMap, HeaderName, HeaderValue, Method, Request as HttpRequest,
    Response as HttpResponse, StatusCode,
};
use tower::util::ServiceFn;
use tower::{service_fn, Layer, ServiceExt};
use tower_http::cors::{AllowHeaders, AllowOrigin, Cors, CorsLayer};

use crate::config::CorsConfig;
use crate::http::request::Request;
use crate::http::response::Response;

type PassThrough = fn(HttpRequest<()>) -> Ready<Result<HttpResponse<()>, Infallible>>;

/// Inner service of the layer. Reaching it means the request was not a preflight.
fn pass_through(_request: HttpRequest<()>) -> Ready<Result<HttpResponse<()>, Infallible>> {
    ready(Ok(HttpResponse::new(())))
}

/// Request headers the layer reads.
const CORS_REQUEST_HEADERS: [HeaderName; 3] = [
    header::ORIGIN,
    header::ACCESS_CONTROL_REQUEST_METHOD,
    header::ACCESS_CONTROL_REQUEST_HEADERS,
];

/// Result of applying the policy to a request.
#[derive(Debug)]
pub enum CorsOutcome {
    /// Preflight answered; the pipeline stops here.
    Preflight(Response),
    /// Headers to merge into the eventual response.
    Continue(HeaderMap),
}

/// Compiled cross-origin policy.
#[derive(Clone)]
pub struct CorsPolicy {
    service: Cors<ServiceFn<PassThrough>>,
    any_origin: bool,
    preflight_status: StatusCode,
}

impl fmt::Debug for CorsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsPolicy")
            .field("any_origin", &self.any_origin)
            .field("preflight_status", &self.preflight_status)
            .finish_non_exhaustive()
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::from_config(&CorsConfig::default())
    }
}

impl CorsPolicy {
    /// Build the policy from validated configuration.
    ///
    /// Entries that cannot be expressed as header values are skipped with a
    /// warning rather than failing startup.
    pub fn from_config(config: &CorsConfig) -> Self {
        let any_origin = config.allows_any_origin();
        let mut vary = Vec::new();

        let origin = if any_origin {
            AllowOrigin::any()
        } else {
            vary.push(header::ORIGIN);
            AllowOrigin::list(parse_all(&config.allowed_origins, "origin", |o| {
                HeaderValue::from_str(o).ok()
            }))
        };

        let methods: Vec<Method> = parse_all(&config.allowed_methods, "method", |m| {
            Method::from_bytes(m.as_bytes()).ok()
        });

        // tower-http refuses credentials alongside a wildcard origin
        let allow_credentials = config.allow_credentials && !any_origin;
        if config.allow_credentials && any_origin {
            tracing::warn!("Ignoring allow_credentials under the permit-all origin policy");
        }

        let mut layer = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_credentials(allow_credentials);

        if config.allowed_headers.is_empty() {
            // Reflect what the browser asked for
            vary.push(header::ACCESS_CONTROL_REQUEST_HEADERS);
            layer = layer.allow_headers(AllowHeaders::mirror_request());
        } else {
            layer = layer.allow_headers(parse_header_names(&config.allowed_headers));
        }
        if !config.exposed_headers.is_empty() {
            layer = layer.expose_headers(parse_header_names(&config.exposed_headers));
        }
        if let Some(secs) = config.max_age_secs {
            layer = layer.max_age(Duration::from_secs(secs));
        }
        layer = layer.vary(vary);

        let preflight_status = StatusCode::from_u16(config.preflight_status)
            .ok()
            .filter(StatusCode::is_success)
            .unwrap_or(StatusCode::NO_CONTENT);

        Self {
            service: layer.layer(service_fn(pass_through as PassThrough)),
            any_origin,
            preflight_status,
        }
    }

    /// Whether every origin may read responses.
    pub fn allows_any_origin(&self) -> bool {
        self.any_origin
    }

    /// A preflight is an OPTIONS request announcing the method it intends to use.
    pub fn is_preflight(request: &Request) -> bool {
        request.method() == Method::OPTIONS
            && request
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// Apply the policy to a request.
    pub async fn evaluate(&self, request: &Request) -> CorsOutcome {
        let preflight = Self::is_preflight(request);
        let answered = self.run_layer(request, preflight).await;

        if preflight {
            tracing::debug!(
                path = %request.path(),
                origin = ?request.headers().get(header::ORIGIN),
                "Preflight answered"
            );
            CorsOutcome::Preflight(
                Response::empty(self.preflight_status).merge_headers(answered.headers()),
            )
        } else {
            CorsOutcome::Continue(answered.into_parts().0.headers)
        }
    }

    /// Headers for a non-preflight response.
    pub async fn response_headers(&self, request: &Request) -> HeaderMap {
        self.run_layer(request, false).await.into_parts().0.headers
    }

    async fn run_layer(&self, request: &Request, preflight: bool) -> HttpResponse<()> {
        // The layer treats every OPTIONS as a preflight, so plain OPTIONS
        // requests are presented to it as GET.
        let method = match request.method() {
            m if *m == Method::OPTIONS && !preflight => Method::GET,
            m => m.clone(),
        };

        let mut probe = HttpRequest::new(());
        *probe.method_mut() = method;
        for name in CORS_REQUEST_HEADERS {
            for value in request.headers().get_all(&name) {
                probe.headers_mut().append(name.clone(), value.clone());
            }
        }

        self.service
            .clone()
            .oneshot(probe)
            .await
            .unwrap_or_else(|never| match never {})
    }
}

fn parse_all<T>(items: &[String], what: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| {
            let parsed = parse(item);
            if parsed.is_none() {
                tracing::warn!(value = %item, kind = what, "Ignoring unusable CORS entry");
            }
            parsed
        })
        .collect()
}

fn parse_header_names(items: &[String]) -> Vec<HeaderName> {
    parse_all(items, "header", |h| HeaderName::from_bytes(h.as_bytes()).ok())
}
