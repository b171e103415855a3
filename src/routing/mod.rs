//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RouteRegistry::register / mount (resource groups under prefixes)
//!     → matcher.rs (parse patterns, compose prefixes)
//!     → freeze as immutable RouteTable
//!
//! Per request:
//!     (method, path)
//!     → router.rs (ordered scan)
//!     → matcher.rs (segment match, bind parameters)
//!     → Return: RouteMatch or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod handler;
pub mod matcher;
pub mod router;

use thiserror::Error;

pub use handler::{handler_fn, Handler, HandlerFailure, HandlerResult};
pub use router::{RouteEntry, RouteMatch, RouteRegistry, RouteTable};

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("route {method} {pattern} is already registered")]
    DuplicateRoute { method: String, pattern: String },

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
