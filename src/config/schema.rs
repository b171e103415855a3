//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the strings service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Request body decoding.
    pub body: BodyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Cross-origin resource sharing policy.
///
/// The defaults permit every origin, the same policy an unconfigured CORS
/// middleware applies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Permitted origins. `"*"` permits any origin.
    pub allowed_origins: Vec<String>,

    /// Methods advertised in preflight responses.
    pub allowed_methods: Vec<String>,

    /// Headers advertised in preflight responses.
    /// Empty means the requested headers are reflected back.
    pub allowed_headers: Vec<String>,

    /// Headers exposed to the browser on actual responses.
    pub exposed_headers: Vec<String>,

    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: Option<u64>,

    /// Status code for successful preflight responses.
    pub preflight_status: u16,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: None,
            preflight_status: 204,
        }
    }
}

impl CorsConfig {
    /// Returns true when the policy permits any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Request body decoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Only accept objects and arrays at the top level of a JSON body.
    pub strict: bool,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_body_size: 100 * 1024, // 100kb
            strict: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
