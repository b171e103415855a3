//! JSON body decoding.
//!
//! Runs after the cross-origin filter and before routing. JSON content is
//! parsed into the request; anything else passes through untouched.
//! gzip and deflate bodies are already inflated by the transport; any
//! coding still present on a JSON body could not be undone.

use axum::http::header;
use serde_json::Value;

use crate::config::BodyConfig;
use crate::http::error::PipelineError;
use crate::http::request::Request;

#[derive(Debug, Clone)]
pub struct BodyDecoder {
    strict: bool,
}

impl Default for BodyDecoder {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl BodyDecoder {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn from_config(config: &BodyConfig) -> Self {
        Self::new(config.strict)
    }

    /// Decode a JSON body into the request.
    ///
    /// Non-JSON content types and empty bodies are left alone.
    pub fn decode(&self, request: &mut Request) -> Result<(), PipelineError> {
        let Some(content_type) = request.header(header::CONTENT_TYPE) else {
            return Ok(());
        };
        let Some(media) = JsonMedia::parse(content_type) else {
            return Ok(());
        };
        if request.raw_body().is_empty() {
            return Ok(());
        }

        if let Some(encoding) = request.header(header::CONTENT_ENCODING) {
            let encoding = encoding.trim().to_ascii_lowercase();
            if encoding != "identity" {
                return Err(PipelineError::UnsupportedEncoding(encoding));
            }
        }

        if let Some(charset) = media.charset {
            if !is_utf8(&charset) {
                return Err(PipelineError::UnsupportedCharset(charset));
            }
        }

        let body = request.raw_body();
        if self.strict {
            let first = body.iter().copied().find(|b| !b.is_ascii_whitespace());
            if !matches!(first, Some(b'{') | Some(b'[')) {
                return Err(PipelineError::MalformedBody(
                    "top-level value must be an object or array".to_string(),
                ));
            }
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| PipelineError::MalformedBody(e.to_string()))?;
        request.set_json(value);
        Ok(())
    }
}

/// A JSON media type with its optional charset.
struct JsonMedia {
    charset: Option<String>,
}

impl JsonMedia {
    /// Returns `None` unless the content type is `application/json` or
    /// `application/*+json`.
    fn parse(content_type: &str) -> Option<Self> {
        let mut parts = content_type.split(';');
        let essence = parts.next()?.trim().to_ascii_lowercase();
        let subtype = essence.strip_prefix("application/")?;
        if subtype != "json" && !subtype.ends_with("+json") {
            return None;
        }

        let charset = parts.find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
        });
        Some(Self { charset })
    }
}

fn is_utf8(charset: &str) -> bool {
    matches!(charset, "utf-8" | "utf8")
}
