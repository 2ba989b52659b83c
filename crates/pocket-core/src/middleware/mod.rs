//! Middleware implementations
//!
//! Middleware sees every request before routing and every response after
//! the operation, including error envelopes and 404/405s.

pub mod access_log;
pub mod body_limit;

pub use access_log::{AccessLog, AccessLogConfig};
pub use body_limit::{format_size, BodyLimit, BodyLimitConfig};

use crate::{Request, Response};

/// Middleware trait - process request/response
pub trait Middleware: Send + Sync {
    /// Process request before routing; returning a response short-circuits
    fn before(&self, req: &mut Request) -> Option<Response>;

    /// Process response after handler
    fn after(&self, req: &Request, res: &mut Response);
}

/// Middleware chain
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Run before middlewares, stopping at the first early response
    ///
    /// Returns how many middlewares saw the request, including the one
    /// that short-circuited. Pass that count to [`run_after`](Self::run_after).
    pub fn run_before(&self, req: &mut Request) -> (usize, Option<Response>) {
        for (i, m) in self.middlewares.iter().enumerate() {
            if let Some(res) = m.before(req) {
                return (i + 1, Some(res));
            }
        }
        (self.middlewares.len(), None)
    }

    /// Run after middlewares in reverse order, for the first `ran` only
    pub fn run_after(&self, ran: usize, req: &Request, res: &mut Response) {
        let ran = ran.min(self.middlewares.len());
        for m in self.middlewares[..ran].iter().rev() {
            m.after(req, res);
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}
