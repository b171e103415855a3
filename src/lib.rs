//! Strings Service Library
//!
//! A JSON-over-HTTP service whose requests run through an ordered dispatch
//! pipeline: cross-origin policy, body decoding, route matching, fallback.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;
pub mod strings;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::Dispatcher;
