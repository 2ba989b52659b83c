//! Access log middleware
//!
//! Assigns each request a correlation id (reusing the client's
//! `X-Request-ID` when present), echoes it on the response and emits one
//! `tracing` event per request with status and latency.

use super::Middleware;
use crate::{Request, Response};
use std::sync::atomic::{AtomicU64, Ordering};

/// Access log configuration
#[derive(Clone)]
pub struct AccessLogConfig {
    /// Header name for request ID
    pub header_name: String,
    /// Generate request ID if not present
    pub generate_id: bool,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Request-ID".to_string(),
            generate_id: true,
        }
    }
}

impl AccessLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id(mut self, generate: bool) -> Self {
        self.generate_id = generate;
        self
    }
}

/// Access log middleware
pub struct AccessLog {
    config: AccessLogConfig,
    counter: AtomicU64,
}

impl AccessLog {
    pub fn new(config: AccessLogConfig) -> Self {
        Self {
            config,
            counter: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{:016x}", count)
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new(AccessLogConfig::default())
    }
}

impl Middleware for AccessLog {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let request_id = req
            .header(&self.config.header_name)
            .map(|s| s.to_string())
            .or_else(|| self.config.generate_id.then(|| self.next_id()));
        req.request_id = request_id;
        None
    }

    fn after(&self, req: &Request, res: &mut Response) {
        if let Some(id) = &req.request_id {
            res.set_header(&self.config.header_name, id.as_str());
        }

        let elapsed = req.received_at.elapsed();
        let id = req.request_id.as_deref().unwrap_or("-");
        if res.status.is_server_error() {
            tracing::warn!(
                request_id = id,
                method = req.method_name(),
                path = %req.path,
                status = res.status.as_u16(),
                latency_us = elapsed.as_micros() as u64,
                "request failed"
            );
        } else {
            tracing::info!(
                request_id = id,
                method = req.method_name(),
                path = %req.path,
                status = res.status.as_u16(),
                latency_us = elapsed.as_micros() as u64,
                "request served"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, RequestBuilder, StatusCode};

    #[test]
    fn test_generates_sequential_ids() {
        let log = AccessLog::default();
        let mut a = Request::new(Method::Get, "/");
        let mut b = Request::new(Method::Get, "/");
        log.before(&mut a);
        log.before(&mut b);

        assert_eq!(a.request_id.as_deref(), Some("0000000000000000"));
        assert_eq!(b.request_id.as_deref(), Some("0000000000000001"));
    }

    #[test]
    fn test_reuses_client_id_and_echoes_it() {
        let log = AccessLog::default();
        let mut req = RequestBuilder::new(Method::Get, "/")
            .header("x-request-id", "abc-123")
            .build();
        assert!(log.before(&mut req).is_none());

        let mut res = Response::new(StatusCode::OK);
        log.after(&req, &mut res);
        assert_eq!(res.header("X-Request-ID"), Some("abc-123"));
    }

    #[test]
    fn test_header_name_is_configurable() {
        let log = AccessLog::new(AccessLogConfig {
            header_name: "X-Correlation-ID".to_string(),
            ..AccessLogConfig::default()
        });
        let mut req = RequestBuilder::new(Method::Get, "/")
            .header("x-correlation-id", "corr-9")
            .build();
        log.before(&mut req);

        let mut res = Response::new(StatusCode::OK);
        log.after(&req, &mut res);
        assert_eq!(res.header("X-Correlation-ID"), Some("corr-9"));
        assert!(res.header("X-Request-ID").is_none());
    }

    #[test]
    fn test_no_id_when_generation_disabled() {
        let log = AccessLog::new(AccessLogConfig::new().generate_id(false));
        let mut req = Request::new(Method::Get, "/");
        log.before(&mut req);

        let mut res = Response::new(StatusCode::OK);
        log.after(&req, &mut res);
        assert!(req.request_id.is_none());
        assert!(res.header("X-Request-ID").is_none());
    }
}
