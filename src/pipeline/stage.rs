//! Declared pipeline order and dispatch states.

use std::fmt;

use crate::http::response::Response;

/// A pipeline stage, in the order it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CrossOrigin,
    BodyDecoder,
    Routing,
}

/// Every request runs through these stages in this order; the fallback
/// responder runs after them if none produced a response.
pub const PIPELINE: [Stage; 3] = [Stage::CrossOrigin, Stage::BodyDecoder, Stage::Routing];

impl Stage {
    /// State reached once this stage has run and passed control on.
    pub fn completed_state(self) -> DispatchState {
        match self {
            Stage::CrossOrigin => DispatchState::CorsChecked,
            Stage::BodyDecoder => DispatchState::BodyDecoded,
            Stage::Routing => DispatchState::Routed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::CrossOrigin => "cross_origin",
            Stage::BodyDecoder => "body_decoder",
            Stage::Routing => "routing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatcher states. `Responded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Start,
    CorsChecked,
    BodyDecoded,
    Routed,
    Responded,
}

/// What produced the final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Preflight,
    BodyRejected,
    Handler,
    HandlerFailure,
    HandlerPanic,
    Fallback,
}

impl Terminal {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminal::Preflight => "preflight",
            Terminal::BodyRejected => "body_rejected",
            Terminal::Handler => "handler",
            Terminal::HandlerFailure => "handler_failure",
            Terminal::HandlerPanic => "handler_panic",
            Terminal::Fallback => "fallback",
        }
    }
}

/// Control decision returned by a stage.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Respond(Response, Terminal),
}
