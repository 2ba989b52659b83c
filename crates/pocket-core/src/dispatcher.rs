//! Request dispatch
//!
//! The [`Dispatcher`] owns the route table, the operations behind it and the
//! middleware chain. It turns one [`Request`] into one [`Response`]:
//!
//! 1. run `before` middleware (may short-circuit, e.g. body too large)
//! 2. resolve the route (404 / 405 on miss)
//! 3. decode path params, query string and body into an [`Input`]
//! 4. run the operation, converting errors and panics into JSON envelopes
//! 5. run `after` middleware in reverse order, for those whose `before` ran
//!
//! The dispatcher is synchronous and `Sync`; the acceptor shares one
//! instance across connections behind an `Arc`.

use crate::collection::SharedCollection;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::parser::decode_path_segment;
use crate::{Error, Method, Request, Response, Result, StatusCode};
use pocket_router::{Lookup, Router};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Parsed input handed to an operation
#[derive(Debug, Clone, Default)]
pub struct Input {
    /// Decoded path parameters
    pub params: HashMap<String, String>,
    /// Decoded query parameters (last duplicate wins)
    pub query: HashMap<String, String>,
    /// Body fields, if a body was sent
    pub body: Option<Map<String, Value>>,
}

impl Input {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Look a value up in path params, then the body, then the query string
    pub fn value(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.params.get(name) {
            return Some(Value::String(v.clone()));
        }
        if let Some(v) = self.body.as_ref().and_then(|b| b.get(name)) {
            return Some(v.clone());
        }
        self.query.get(name).map(|v| Value::String(v.clone()))
    }

    /// Query fields overlaid with body fields
    ///
    /// Create and update accept either `POST /tarefa?titulo=x` or a JSON
    /// body. A body field wins over a query field of the same name.
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields: Map<String, Value> = self
            .query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Some(body) = &self.body {
            for (k, v) in body {
                fields.insert(k.clone(), v.clone());
            }
        }
        fields
    }
}

/// What an operation returns on success
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
        }
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        Response::json_value(reply.status, &reply.body)
    }
}

/// A resource operation: pure function of its input
pub type Operation = Arc<dyn Fn(&Input) -> Result<Reply> + Send + Sync>;

/// Route table + operations + middleware
pub struct Dispatcher {
    router: Router,
    operations: Vec<Operation>,
    middleware: MiddlewareChain,
}

impl Dispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            operations: Vec::new(),
            middleware: MiddlewareChain::new(),
        }
    }

    /// Register an operation. Earlier registrations take precedence.
    pub fn route<F>(&mut self, method: Method, pattern: &str, operation: F) -> Result<&mut Self>
    where
        F: Fn(&Input) -> Result<Reply> + Send + Sync + 'static,
    {
        if method == Method::Extension {
            return Err(Error::UnroutableMethod {
                method: method.to_string(),
                pattern: pattern.to_string(),
            });
        }
        let handler_id = u32::try_from(self.operations.len())
            .map_err(|_| Error::Internal("too many routes".to_string()))?;
        self.router.insert(method.as_str(), pattern, handler_id)?;
        self.operations.push(Arc::new(operation));
        tracing::debug!(method = %method, pattern, handler_id, "route registered");
        Ok(self)
    }

    /// Add a GET route
    pub fn get<F>(&mut self, pattern: &str, operation: F) -> Result<&mut Self>
    where
        F: Fn(&Input) -> Result<Reply> + Send + Sync + 'static,
    {
        self.route(Method::Get, pattern, operation)
    }

    /// Add a POST route
    pub fn post<F>(&mut self, pattern: &str, operation: F) -> Result<&mut Self>
    where
        F: Fn(&Input) -> Result<Reply> + Send + Sync + 'static,
    {
        self.route(Method::Post, pattern, operation)
    }

    /// Add a PUT route
    pub fn put<F>(&mut self, pattern: &str, operation: F) -> Result<&mut Self>
    where
        F: Fn(&Input) -> Result<Reply> + Send + Sync + 'static,
    {
        self.route(Method::Put, pattern, operation)
    }

    /// Add a DELETE route
    pub fn delete<F>(&mut self, pattern: &str, operation: F) -> Result<&mut Self>
    where
        F: Fn(&Input) -> Result<Reply> + Send + Sync + 'static,
    {
        self.route(Method::Delete, pattern, operation)
    }

    /// Register the CRUD routes for a collection
    pub fn resource(&mut self, collection: SharedCollection) -> Result<&mut Self> {
        crate::handlers::crud::register(self, collection)?;
        Ok(self)
    }

    /// Append a middleware to the chain
    pub fn with_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.add(middleware);
        self
    }

    /// Number of registered routes
    pub fn route_count(&self) -> usize {
        self.operations.len()
    }

    /// Handle one request end to end
    pub fn dispatch(&self, req: Request) -> Response {
        self.with_middleware_chain(req, |d, req| match d.resolve(req) {
            Ok(reply) => reply.into(),
            Err(err) => {
                if err.status_code().is_server_error() {
                    tracing::error!(method = req.method_name(), path = %req.path, error = %err, "operation failed");
                }
                err.into()
            }
        })
    }

    /// Answer a request the acceptor already refused (body too large,
    /// body read timeout) with `err`, still passing through middleware
    pub fn reject(&self, req: Request, err: Error) -> Response {
        self.with_middleware_chain(req, |_, _| err.into())
    }

    fn with_middleware_chain<F>(&self, mut req: Request, handle: F) -> Response
    where
        F: FnOnce(&Self, &mut Request) -> Response,
    {
        let (ran, early) = self.middleware.run_before(&mut req);
        let mut response = match early {
            Some(early) => early,
            None => handle(self, &mut req),
        };
        self.middleware.run_after(ran, &req, &mut response);
        response
    }

    fn resolve(&self, req: &mut Request) -> Result<Reply> {
        if req.method == Method::Extension {
            let allow = self.router.allowed_methods(&req.path);
            return Err(if allow.is_empty() {
                Error::RouteNotFound {
                    method: req.method_name().to_string(),
                    path: req.path.clone(),
                }
            } else {
                Error::MethodNotAllowed {
                    method: req.method_name().to_string(),
                    path: req.path.clone(),
                    allow,
                }
            });
        }

        let matched = match self.router.find(req.method.as_str(), &req.path) {
            Lookup::Matched(m) => m,
            Lookup::MethodNotAllowed(allow) => {
                return Err(Error::MethodNotAllowed {
                    method: req.method.to_string(),
                    path: req.path.clone(),
                    allow,
                })
            }
            Lookup::NotFound => {
                return Err(Error::RouteNotFound {
                    method: req.method.to_string(),
                    path: req.path.clone(),
                })
            }
        };

        for (name, raw) in &matched.params {
            req.params.insert(name.clone(), decode_path_segment(raw)?);
        }

        let input = Input {
            params: req.params.clone(),
            query: req.query_params(),
            body: req.body_fields()?,
        };

        let operation = self
            .operations
            .get(matched.handler_id as usize)
            .ok_or_else(|| Error::Internal(format!("no operation for handler {}", matched.handler_id)))?;

        match catch_unwind(AssertUnwindSafe(|| operation(&input))) {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                Err(Error::Internal(format!("operation panicked: {}", detail)))
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestBuilder;
    use serde_json::json;

    fn echo_dispatcher() -> Dispatcher {
        let mut d = Dispatcher::new();
        d.get("/eco/{nome}", |input| {
            Ok(Reply::ok(json!({ "nome": input.param("nome") })))
        })
        .unwrap();
        d.post("/eco", |input| Ok(Reply::created(Value::Object(input.fields()))))
            .unwrap();
        d.get("/falha", |_| -> Result<Reply> { panic!("segredo interno") })
            .unwrap();
        d.get("/interno", |_| Err(Error::Internal("detalhe interno".into())))
            .unwrap();
        d
    }

    #[test]
    fn test_path_params_are_decoded() {
        let d = echo_dispatcher();
        let res = d.dispatch(Request::from_target(Method::Get, "/eco/Jo%C3%A3o"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body_json().unwrap(), json!({"nome": "João"}));
    }

    #[test]
    fn test_body_overrides_query() {
        let d = echo_dispatcher();
        let req = RequestBuilder::new(Method::Post, "/eco")
            .query("a=1&b=2")
            .json(&json!({"b": 3}))
            .build();
        let res = d.dispatch(req);
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.body_json().unwrap(), json!({"a": "1", "b": 3}));
    }

    #[test]
    fn test_unknown_route() {
        let d = echo_dispatcher();
        for _ in 0..3 {
            let res = d.dispatch(Request::from_target(Method::Get, "/nao-existe"));
            assert_eq!(res.status, StatusCode::NOT_FOUND);
            assert_eq!(res.content_type(), Some("application/json"));
            assert!(res.body_json().unwrap()["erro"].is_string());
        }
    }

    #[test]
    fn test_method_not_allowed() {
        let d = echo_dispatcher();
        let res = d.dispatch(Request::from_target(Method::Delete, "/eco"));
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("POST"));
    }

    #[test]
    fn test_extension_method_lists_allowed_ones() {
        let d = echo_dispatcher();
        let mut req = Request::new(Method::Extension, "/eco/x");
        req.method_token = Some("BREW".to_string());
        let res = d.dispatch(req);
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET"));
        assert!(res.body_string().unwrap().contains("BREW"));

        let mut req = Request::new(Method::Extension, "/nao-existe");
        req.method_token = Some("BREW".to_string());
        assert_eq!(d.dispatch(req).status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_extension_method_cannot_be_routed() {
        let mut d = Dispatcher::new();
        let err = d
            .route(Method::Extension, "/x", |_| Ok(Reply::ok(Value::Null)))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnroutableMethod { .. }));
        assert_eq!(d.route_count(), 0);
    }

    #[test]
    fn test_reject_runs_middleware() {
        let mut d = echo_dispatcher();
        d.with_middleware(crate::AccessLog::default());
        let res = d.reject(
            Request::new(Method::Post, "/eco"),
            Error::PayloadTooLarge { size: 10, limit: 5 },
        );
        assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(res.header("x-request-id").is_some());
        assert!(res.body_json().unwrap()["erro"].is_string());
    }

    #[test]
    fn test_malformed_json() {
        let d = echo_dispatcher();
        let req = RequestBuilder::new(Method::Post, "/eco")
            .header("content-type", "application/json")
            .body("{\"a\":")
            .build();
        let res = d.dispatch(req);
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body_json().unwrap()["erro"].is_string());
    }

    #[test]
    fn test_panics_become_generic_500() {
        let d = echo_dispatcher();
        let res = d.dispatch(Request::from_target(Method::Get, "/falha"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body_json().unwrap(), json!({"erro": "Erro interno do servidor"}));

        let res = d.dispatch(Request::from_target(Method::Get, "/interno"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!res.body_string().unwrap().contains("detalhe"));

        // Still serving after a panic
        let res = d.dispatch(Request::from_target(Method::Get, "/eco/x"));
        assert_eq!(res.status, StatusCode::OK);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut d = Dispatcher::new();
        assert!(d.get("/x/{id:uuid}", |_| Ok(Reply::ok(Value::Null))).is_err());
        assert_eq!(d.route_count(), 0);
    }
}
