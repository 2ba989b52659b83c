//! HTTP Request types

use crate::parser::{self, BodyKind};
use crate::Result;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::time::Instant;

pub use crate::parser::Method;

/// HTTP Request
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Raw token when `method` is [`Method::Extension`]
    pub method_token: Option<String>,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    /// Request headers (stack-allocated for small header counts)
    pub headers: SmallVec<[(String, String); 16]>,
    /// Request body
    pub body: bytes::Bytes,
    /// Route parameters, percent-decoded (populated by the dispatcher)
    pub params: HashMap<String, String>,
    /// Correlation id (populated by the access log middleware)
    pub request_id: Option<String>,
    /// When the request was handed to the dispatcher
    pub received_at: Instant,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            method_token: None,
            path: path.into(),
            query: None,
            headers: SmallVec::new(),
            body: bytes::Bytes::new(),
            params: HashMap::new(),
            request_id: None,
            received_at: Instant::now(),
        }
    }

    /// Split a request target (`/path?query`) into path and query
    pub fn from_target(method: Method, target: &str) -> Self {
        let mut request = match target.split_once('?') {
            Some((path, query)) => {
                let mut request = Self::new(method, path);
                request.query = Some(query.to_string());
                request
            }
            None => Self::new(method, target),
        };
        if request.path.is_empty() {
            request.path = "/".to_string();
        }
        request
    }

    /// Method as sent by the client
    pub fn method_name(&self) -> &str {
        match (&self.method, &self.method_token) {
            (Method::Extension, Some(token)) => token.as_str(),
            (method, _) => method.as_str(),
        }
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get content-type header
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get content-length header
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    /// Get a route parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Parse query string into key-value pairs (last duplicate wins)
    pub fn query_params(&self) -> HashMap<String, String> {
        self.query
            .as_deref()
            .map(parser::parse_query)
            .unwrap_or_default()
    }

    /// Parse the body according to its content type
    pub fn body_fields(&self) -> Result<Option<Map<String, Value>>> {
        if self.body.is_empty() {
            return Ok(None);
        }
        let kind = BodyKind::from_content_type(self.content_type())?;
        parser::parse_body(&self.body, kind)
    }
}

/// Builder for constructing requests
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Create a new builder
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request: Request::new(method, path),
        }
    }

    /// Set query string
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.request.query = Some(query.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    /// Set body
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Set a JSON body and the matching content type
    pub fn json(self, body: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(body.to_string())
    }

    /// Build the request
    pub fn build(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_header() {
        let req = RequestBuilder::new(Method::Get, "/")
            .header("Content-Type", "application/json")
            .header("Content-Length", "12")
            .build();

        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.content_length(), Some(12));
    }

    #[test]
    fn test_method_name_keeps_extension_token() {
        let mut req = Request::new(Method::Extension, "/tarefa/1");
        assert_eq!(req.method_name(), "EXTENSION");
        req.method_token = Some("BREW".to_string());
        assert_eq!(req.method_name(), "BREW");
        assert_eq!(Request::new(Method::Put, "/").method_name(), "PUT");
    }

    #[test]
    fn test_from_target() {
        let req = Request::from_target(Method::Get, "/tarefa?id=3&id=4");
        assert_eq!(req.path, "/tarefa");
        assert_eq!(req.query_params().get("id"), Some(&"4".to_string()));

        let req = Request::from_target(Method::Get, "?x=1");
        assert_eq!(req.path, "/");
    }

    #[test]
    fn test_body_fields() {
        let req = RequestBuilder::new(Method::Post, "/tarefa")
            .json(&json!({"titulo": "Estudar"}))
            .build();
        let fields = req.body_fields().unwrap().unwrap();
        assert_eq!(fields["titulo"], json!("Estudar"));

        let req = RequestBuilder::new(Method::Post, "/tarefa").build();
        assert!(req.body_fields().unwrap().is_none());

        let req = RequestBuilder::new(Method::Post, "/tarefa")
            .header("content-type", "text/plain")
            .body("oi")
            .build();
        assert!(req.body_fields().is_err());
    }
}
