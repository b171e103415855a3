//! Route registration and lookup.
//!
//! # Responsibilities
//! - Collect route entries and mounted groups at startup
//! - Freeze them into an immutable table
//! - Look up the matching entry for a request, or report no match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in registration order: first registered, first matched
//! - Duplicate (method, pattern) registrations are rejected
//! - GET entries also answer HEAD, in the same ordered pass
//! - Explicit NoMatch rather than silent default

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::http::request::{PathParams, Request};
use crate::routing::handler::Handler;
use crate::routing::matcher::{join_prefix, PathPattern};
use crate::routing::RegistryError;

/// A registered (method, pattern, handler) association.
#[derive(Clone)]
pub struct RouteEntry {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    fn serves(&self, method: &Method) -> bool {
        self.method == *method || (*method == Method::HEAD && self.method == Method::GET)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Builder for a set of routes. Also used as the sub-registry of a mount.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    entries: Vec<RouteEntry>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Fails if the pattern is invalid or the
    /// (method, pattern) pair is already taken.
    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, RegistryError> {
        let pattern = PathPattern::parse(pattern)?;
        self.insert(RouteEntry {
            method,
            pattern,
            handler: Arc::new(handler),
        })?;
        Ok(self)
    }

    /// Attach every route of `group` under `prefix`, keeping the group's order.
    pub fn mount(&mut self, prefix: &str, group: RouteRegistry) -> Result<&mut Self, RegistryError> {
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(RegistryError::InvalidPattern {
                pattern: prefix.to_string(),
                reason: "mount prefix must start with '/'".to_string(),
            });
        }

        for entry in group.entries {
            let pattern = PathPattern::parse(&join_prefix(prefix, entry.pattern.as_str()))?;
            self.insert(RouteEntry { pattern, ..entry })?;
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze into an immutable table.
    pub fn freeze(self) -> RouteTable {
        for entry in &self.entries {
            tracing::debug!(method = %entry.method, pattern = entry.pattern(), "Route registered");
        }
        RouteTable {
            entries: self.entries.into(),
        }
    }

    fn insert(&mut self, entry: RouteEntry) -> Result<(), RegistryError> {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.method == entry.method && e.pattern.same_shape(&entry.pattern));
        if duplicate {
            return Err(RegistryError::DuplicateRoute {
                method: entry.method.to_string(),
                pattern: entry.pattern.as_str().to_string(),
            });
        }
        self.entries.push(entry);
        Ok(())
    }
}

/// A successful lookup: the entry plus the parameters it bound.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: PathParams,
}

/// Frozen route table shared by all requests.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Arc<[RouteEntry]>,
}

impl RouteTable {
    /// Find the entry answering `request`.
    pub fn lookup(&self, request: &Request) -> Option<RouteMatch<'_>> {
        let segments: Vec<&str> = request.segments().collect();
        self.find(request.method(), &segments)
    }

    /// Find the first entry serving `method` whose pattern matches the
    /// non-empty path `segments`.
    pub fn find(&self, method: &Method, segments: &[&str]) -> Option<RouteMatch<'_>> {
        self.entries.iter().find_map(|entry| {
            if !entry.serves(method) {
                return None;
            }
            entry
                .pattern
                .matches(segments.iter().copied())
                .map(|params| RouteMatch { entry, params })
        })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<RouteRegistry> for RouteTable {
    fn from(registry: RouteRegistry) -> Self {
        registry.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::Response;
    use crate::routing::handler::handler_fn;
    use axum::http::StatusCode;

    fn tagged(tag: &'static str) -> impl Handler {
        handler_fn(move |_req: &Request| Ok(Response::text(StatusCode::OK, tag)))
    }

    fn tag_of(table: &RouteTable, method: Method, path: &str) -> Option<String> {
        table
            .lookup(&Request::new(method, path))
            .map(|m| format!("{} {}", m.entry.method(), m.entry.pattern()))
    }

    #[test]
    fn test_first_registered_wins() {
        let mut registry = RouteRegistry::new();
        registry
            .register(Method::GET, "/strings/{id}", tagged("a"))
            .unwrap()
            .register(Method::GET, "/strings/count", tagged("b"))
            .unwrap();
        let table = registry.freeze();

        // Both patterns match; the earlier registration resolves.
        assert_eq!(
            tag_of(&table, Method::GET, "/strings/count").as_deref(),
            Some("GET /strings/{id}")
        );
    }

    #[test]
    fn test_method_must_match() {
        let mut registry = RouteRegistry::new();
        registry.register(Method::POST, "/strings", tagged("a")).unwrap();
        let table = registry.freeze();

        assert!(table.lookup(&Request::new(Method::POST, "/strings")).is_some());
        assert!(table.lookup(&Request::new(Method::GET, "/strings")).is_none());
        assert!(table.lookup(&Request::new(Method::POST, "/unknown")).is_none());
    }

    #[test]
    fn test_head_served_by_get() {
        let mut registry = RouteRegistry::new();
        registry.register(Method::GET, "/strings", tagged("a")).unwrap();
        let table = registry.freeze();

        let found = table.lookup(&Request::new(Method::HEAD, "/strings")).unwrap();
        assert_eq!(found.entry.method(), Method::GET);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = RouteRegistry::new();
        registry.register(Method::GET, "/strings/{id}", tagged("a")).unwrap();

        let err = registry
            .register(Method::GET, "/strings/{name}", tagged("b"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRoute { .. }));

        // Same pattern, different method is fine
        registry.register(Method::DELETE, "/strings/{id}", tagged("c")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_mount_prefixes_and_preserves_order() {
        let mut strings = RouteRegistry::new();
        strings
            .register(Method::POST, "/", tagged("create"))
            .unwrap()
            .register(Method::GET, "/{id}", tagged("read"))
            .unwrap()
            .register(Method::GET, "/stats", tagged("stats"))
            .unwrap();

        let mut root = RouteRegistry::new();
        root.register(Method::GET, "/health", tagged("health")).unwrap();
        root.mount("/strings", strings).unwrap();
        root.register(Method::GET, "/version", tagged("version")).unwrap();
        let table = root.freeze();

        let patterns: Vec<&str> = table.entries().iter().map(|e| e.pattern()).collect();
        assert_eq!(
            patterns,
            vec!["/health", "/strings", "/strings/{id}", "/strings/stats", "/version"]
        );

        let found = table.lookup(&Request::new(Method::GET, "/strings/abc")).unwrap();
        assert_eq!(found.params.get("id"), Some("abc"));

        // Mounted order is kept: {id} shadows stats
        assert_eq!(
            tag_of(&table, Method::GET, "/strings/stats").as_deref(),
            Some("GET /strings/{id}")
        );
        assert!(table.lookup(&Request::new(Method::POST, "/strings/")).is_some());
    }

    #[test]
    fn test_mount_collision_rejected() {
        let mut group = RouteRegistry::new();
        group.register(Method::GET, "/", tagged("list")).unwrap();

        let mut root = RouteRegistry::new();
        root.register(Method::GET, "/strings", tagged("direct")).unwrap();
        assert!(matches!(
            root.mount("/strings/", group),
            Err(RegistryError::DuplicateRoute { .. })
        ));
    }

    #[test]
    fn test_nested_mounts() {
        let mut inner = RouteRegistry::new();
        inner.register(Method::GET, "/{id}", tagged("inner")).unwrap();
        let mut middle = RouteRegistry::new();
        middle.mount("/v1", inner).unwrap();
        let mut root = RouteRegistry::new();
        root.mount("/strings", middle).unwrap();
        let table = RouteTable::from(root);

        let found = table.lookup(&Request::new(Method::GET, "/strings/v1/xyz")).unwrap();
        assert_eq!(found.entry.pattern(), "/strings/v1/{id}");
        assert_eq!(found.params.get("id"), Some("xyz"));
    }

    #[test]
    fn test_bad_mount_prefix() {
        let mut root = RouteRegistry::new();
        assert!(root.mount("strings", RouteRegistry::new()).is_err());
    }
}
