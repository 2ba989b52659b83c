//! pocket-router: Zero-dependency ordered HTTP route table
//!
//! Routes are kept in declaration order and the first route whose method
//! and pattern both match wins. There is no specificity ranking: if
//! `/users/{id}` is declared before `/users/me`, the parameter route
//! shadows the literal one.
//!
//! ## Pattern Syntax
//! - `users` - Literal segment
//! - `{name}` - Named parameter (captures one segment)
//! - `{name:int}` - Named parameter restricted to ASCII digits
//! - `{*name}` - Remainder (captures the rest of the path, must be last)
//!
//! Empty segments are ignored, so `/users/` and `/users` are the same path.
//!
//! ## Example
//! ```
//! use pocket_router::{Lookup, Router};
//!
//! let mut router = Router::new();
//! router.insert("GET", "/tarefa", 0).unwrap();
//! router.insert("GET", "/tarefa/{id:int}", 1).unwrap();
//!
//! match router.find("GET", "/tarefa/42") {
//!     Lookup::Matched(m) => {
//!         assert_eq!(m.handler_id, 1);
//!         assert_eq!(m.params, vec![("id".to_string(), "42".to_string())]);
//!     }
//!     other => panic!("unexpected lookup: {:?}", other),
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The matched handler ID
    pub handler_id: u32,
    /// Captured path parameters as (name, value) pairs, raw (not percent-decoded)
    pub params: Vec<(String, String)>,
}

impl Match {
    /// Get params as HashMap for convenient access
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }
}

/// Outcome of a route lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A route matched both method and path
    Matched(Match),
    /// The path is known but not for this method; carries the methods that are
    /// registered for it, in declaration order
    MethodNotAllowed(Vec<String>),
    /// No route matches the path at all
    NotFound,
}

/// Invalid route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid route pattern {:?}: {}", self.pattern, self.reason)
    }
}

impl std::error::Error for PatternError {}

/// Parameter type constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Any,
    Int,
}

impl ParamKind {
    fn accepts(self, segment: &str) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::Int => segment.bytes().all(|b| b.is_ascii_digit()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, kind: ParamKind },
    Rest(String),
}

/// Compiled path pattern
#[derive(Debug, Clone)]
struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(path: &str) -> Result<Self, PatternError> {
        let error = |reason| PatternError {
            pattern: path.to_string(),
            reason,
        };

        let raw: Vec<&str> = split_path(path).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (i, segment) in raw.iter().enumerate() {
            let Some(inner) = segment.strip_prefix('{') else {
                if segment.contains('{') || segment.contains('}') {
                    return Err(error("braces must wrap a whole segment"));
                }
                segments.push(Segment::Literal(segment.to_string()));
                continue;
            };
            let inner = inner
                .strip_suffix('}')
                .ok_or_else(|| error("unterminated parameter"))?;

            if let Some(name) = inner.strip_prefix('*') {
                if i + 1 != raw.len() {
                    return Err(error("remainder parameter must be the last segment"));
                }
                if name.is_empty() {
                    return Err(error("remainder parameter needs a name"));
                }
                segments.push(Segment::Rest(name.to_string()));
                continue;
            }

            let (name, kind) = match inner.split_once(':') {
                None => (inner, ParamKind::Any),
                Some((name, "int")) => (name, ParamKind::Int),
                Some(_) => return Err(error("unknown parameter type")),
            };
            if name.is_empty() {
                return Err(error("parameter needs a name"));
            }
            segments.push(Segment::Param {
                name: name.to_string(),
                kind,
            });
        }

        Ok(Self { segments })
    }

    fn matches(&self, path: &[&str]) -> Option<Vec<(String, String)>> {
        let mut params = Vec::new();
        let mut rest = path;

        for segment in &self.segments {
            match segment {
                Segment::Rest(name) => {
                    if rest.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), rest.join("/")));
                    return Some(params);
                }
                Segment::Literal(literal) => {
                    let (first, tail) = rest.split_first()?;
                    if *first != literal.as_str() {
                        return None;
                    }
                    rest = tail;
                }
                Segment::Param { name, kind } => {
                    let (first, tail) = rest.split_first()?;
                    if !kind.accepts(first) {
                        return None;
                    }
                    params.push((name.clone(), first.to_string()));
                    rest = tail;
                }
            }
        }

        rest.is_empty().then_some(params)
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: String,
    pattern: Pattern,
    handler_id: u32,
}

/// Ordered route table
///
/// Lookup is a linear scan in declaration order, which keeps
/// first-match-wins semantics exact. Route tables here hold tens of entries.
#[derive(Debug, Default, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.), case-insensitive
    /// * `path` - URL pattern with optional `{params}`
    /// * `handler_id` - Identifier handed back on match
    pub fn insert(&mut self, method: &str, path: &str, handler_id: u32) -> Result<(), PatternError> {
        let pattern = Pattern::parse(path)?;
        self.routes.push(Route {
            method: method.to_uppercase(),
            pattern,
            handler_id,
        });
        Ok(())
    }

    /// Find the first route matching `method` and `path`
    ///
    /// `HEAD` falls back to the first matching `GET` route when no `HEAD`
    /// route is declared for the path.
    pub fn find(&self, method: &str, path: &str) -> Lookup {
        let method = method.to_uppercase();
        let segments: Vec<&str> = split_path(path).collect();

        if let Some(m) = self.find_method(&method, &segments) {
            return Lookup::Matched(m);
        }
        if method == "HEAD" {
            if let Some(m) = self.find_method("GET", &segments) {
                return Lookup::Matched(m);
            }
        }

        let allowed = self.allowed_for(&segments);
        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::MethodNotAllowed(allowed)
        }
    }

    fn find_method(&self, method: &str, segments: &[&str]) -> Option<Match> {
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route.pattern.matches(segments).map(|params| Match {
                    handler_id: route.handler_id,
                    params,
                })
            })
    }

    fn allowed_for(&self, segments: &[&str]) -> Vec<String> {
        let mut allowed: Vec<String> = Vec::new();
        for route in &self.routes {
            if !allowed.contains(&route.method) && route.pattern.matches(segments).is_some() {
                allowed.push(route.method.clone());
            }
        }
        allowed
    }

    /// Methods registered for `path`, in declaration order
    pub fn allowed_methods(&self, path: &str) -> Vec<String> {
        let segments: Vec<&str> = split_path(path).collect();
        self.allowed_for(&segments)
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
