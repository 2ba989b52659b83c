//! Body size limit middleware
//!
//! Rejects oversized bodies with 413 before any parsing happens. The
//! acceptor enforces the same limit while reading, so this catches bodies
//! that arrive through other paths (tests, embedding).

use super::Middleware;
use crate::{Error, Request, Response};

/// Body limit configuration
#[derive(Debug, Clone, Copy)]
pub struct BodyLimitConfig {
    /// Maximum body size in bytes
    pub max_size: usize,
}

impl BodyLimitConfig {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Set limit in kilobytes
    pub fn kb(size: usize) -> Self {
        Self::new(size * 1024)
    }

    /// Set limit in megabytes
    pub fn mb(size: usize) -> Self {
        Self::new(size * 1024 * 1024)
    }

    /// Parse size from string (e.g., "10mb", "500kb", "2048")
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();

        let (num_str, multiplier) = if let Some(n) = s.strip_suffix("gb") {
            (n, 1024 * 1024 * 1024)
        } else if let Some(n) = s.strip_suffix("mb") {
            (n, 1024 * 1024)
        } else if let Some(n) = s.strip_suffix("kb") {
            (n, 1024)
        } else if let Some(n) = s.strip_suffix('b') {
            (n, 1)
        } else {
            (s.as_str(), 1)
        };

        let num: usize = num_str.trim().parse().ok()?;
        num.checked_mul(multiplier).map(Self::new)
    }
}

impl Default for BodyLimitConfig {
    fn default() -> Self {
        Self::mb(1)
    }
}

/// Format size for display
pub fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

/// Body limit middleware
pub struct BodyLimit {
    config: BodyLimitConfig,
}

impl BodyLimit {
    pub fn new(config: BodyLimitConfig) -> Self {
        Self { config }
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }
}

impl Middleware for BodyLimit {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let declared = req.content_length().unwrap_or(0);
        let size = declared.max(req.body.len());
        if size > self.config.max_size {
            tracing::debug!(
                size = %format_size(size),
                limit = %format_size(self.config.max_size),
                "request body over limit"
            );
            return Some(
                Error::PayloadTooLarge {
                    size,
                    limit: self.config.max_size,
                }
                .into(),
            );
        }
        None
    }

    fn after(&self, _req: &Request, _res: &mut Response) {}
}
