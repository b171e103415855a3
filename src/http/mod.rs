//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout, body buffering)
//!     → request.rs (method, path, headers, raw body)
//!     → pipeline::Dispatcher (cors → body → routing → fallback)
//!     → response.rs (status, headers, JSON body)
//!     → Send to client
//! ```

pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use error::PipelineError;
pub use request::{PathParams, Request};
pub use response::{Response, ResponseBody};
pub use server::{HttpServer, X_REQUEST_ID};
