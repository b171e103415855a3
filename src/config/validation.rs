//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Check that CORS origins, methods and header names are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, Method, StatusCode};

use crate::config::schema::{CorsConfig, ServiceConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    validate_cors(&config.cors, &mut errors);

    if config.body.max_body_size == 0 {
        errors.push(ValidationError::new("body.max_body_size", "must be greater than zero"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_cors(cors: &CorsConfig, errors: &mut Vec<ValidationError>) {
    if cors.allowed_origins.is_empty() {
        errors.push(ValidationError::new(
            "cors.allowed_origins",
            "must list at least one origin or \"*\"",
        ));
    }

    for origin in cors.allowed_origins.iter().filter(|o| *o != "*") {
        if !is_valid_origin(origin) {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not an origin (scheme://host[:port])", origin),
            ));
        }
    }

    // Browsers refuse credentialed responses carrying a wildcard origin
    if cors.allow_credentials && cors.allows_any_origin() {
        errors.push(ValidationError::new(
            "cors.allow_credentials",
            "cannot be combined with a \"*\" origin",
        ));
    }

    for method in &cors.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_methods",
                format!("'{}' is not an HTTP method", method),
            ));
        }
    }

    for (field, names) in [
        ("cors.allowed_headers", &cors.allowed_headers),
        ("cors.exposed_headers", &cors.exposed_headers),
    ] {
        for name in names {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    field,
                    format!("'{}' is not a header name", name),
                ));
            }
        }
    }

    let preflight_ok = StatusCode::from_u16(cors.preflight_status)
        .map(|s| s.is_success())
        .unwrap_or(false);
    if !preflight_ok {
        errors.push(ValidationError::new(
            "cors.preflight_status",
            format!("{} is not a 2xx status", cors.preflight_status),
        ));
    }
}

/// Origins are serialized as `scheme://host[:port]` with no path.
fn is_valid_origin(origin: &str) -> bool {
    let Some((scheme, rest)) = origin.split_once("://") else {
        return false;
    };
    let scheme_ok = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let host_ok = !rest.is_empty()
        && !rest.contains('/')
        && rest.chars().all(|c| c.is_ascii_graphic());
    scheme_ok && host_ok
}
