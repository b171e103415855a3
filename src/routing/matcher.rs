//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse route patterns (`/strings/{id}`) into segments
//! - Match request paths segment by segment, binding parameters
//! - Compose mount prefixes with sub-patterns
//!
//! # Design Decisions
//! - Literal segments match exactly (case-sensitive)
//! - A parameter binds exactly one segment, never more
//! - Empty segments are ignored on both sides, so trailing slashes match
//! - No regex to guarantee O(n) matching

use percent_encoding::percent_decode_str;

use crate::http::request::PathParams;
use crate::routing::RegistryError;

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern such as `/strings/{id}/reverse`.
    pub fn parse(pattern: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(invalid("parameter names are alphanumeric"));
                    }
                    if segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name)) {
                        return Err(invalid("duplicate parameter name"));
                    }
                    Segment::Param(name.to_string())
                }
                None => {
                    if raw.contains('{') || raw.contains('}') {
                        return Err(invalid("parameters must span a whole segment"));
                    }
                    Segment::Literal(raw.to_string())
                }
            };
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Two patterns have the same shape when they match exactly the same
    /// paths, whatever their parameter names.
    pub fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// Match path segments, returning bound parameters on success.
    pub fn matches<'a, I>(&self, path: I) -> Option<PathParams>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut params = PathParams::new();
        let mut path = path.into_iter();

        for segment in &self.segments {
            let actual = path.next()?;
            match segment {
                Segment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = percent_decode_str(actual).decode_utf8_lossy();
                    params.push(name.as_str(), value.into_owned());
                }
            }
        }

        if path.next().is_some() {
            return None;
        }
        Some(params)
    }
}

/// Join a mount prefix and a sub-pattern with exactly one separator.
pub fn join_prefix(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let pattern = pattern.trim_start_matches('/');
    if pattern.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{}/{}", prefix, pattern)
    }
}
