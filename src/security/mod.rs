//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (tower-http CorsLayer: origin check, preflight answer)
//!     → Pass to body decoding and routing
//! Outgoing response:
//!     ← cors.rs allow headers merged by the dispatcher
//! ```
//!
//! # Design Decisions
//! - Policy compiled once from configuration
//! - Default policy permits every origin

pub mod cors;

pub use cors::{CorsOutcome, CorsPolicy};
