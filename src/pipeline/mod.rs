//! Request dispatch pipeline.
//!
//! # Data Flow
//! ```text
//! Request (buffered body)
//!     → security::cors (preflight? respond : collect allow headers)
//!     → body.rs (JSON content? decode : pass)
//!     → routing::RouteTable (match? handler : pass)
//!     → fallback.rs (404)
//!     → merge cross-origin headers
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Stage order is the declared `PIPELINE` list, not layer registration order
//! - Any stage may short-circuit; the rest are skipped
//! - One response per request

pub mod body;
pub mod dispatcher;
pub mod fallback;
pub mod stage;

pub use body::BodyDecoder;
pub use dispatcher::{Dispatch, Dispatcher};
pub use stage::{DispatchState, Stage, Terminal, PIPELINE};
