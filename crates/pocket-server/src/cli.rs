//! Command line and environment configuration

use clap::Parser;
use pocket_core::{BodyLimitConfig, ServerConfig};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pocket")]
#[command(about = "Minimal JSON API server with in-memory collections", long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "POCKET_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "POCKET_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Serve one connection at a time
    #[arg(long, env = "POCKET_SEQUENTIAL", default_value_t = false)]
    pub sequential: bool,

    /// Runtime worker threads (defaults to the number of CPUs)
    #[arg(long, env = "POCKET_WORKERS")]
    pub workers: Option<usize>,

    #[arg(long, env = "POCKET_HEADER_TIMEOUT_MS", default_value_t = 5_000)]
    pub header_timeout_ms: u64,

    #[arg(long, env = "POCKET_BODY_TIMEOUT_MS", default_value_t = 10_000)]
    pub body_timeout_ms: u64,

    /// Keep-alive connection lifetime
    #[arg(long, env = "POCKET_CONNECTION_TIMEOUT_MS", default_value_t = 60_000)]
    pub connection_timeout_ms: u64,

    /// Maximum request body, e.g. `1mb`, `500kb`, `2048`
    #[arg(long, env = "POCKET_MAX_BODY_SIZE", default_value = "1mb", value_parser = parse_body_size)]
    pub max_body_size: usize,
}

fn parse_body_size(s: &str) -> Result<usize, String> {
    BodyLimitConfig::parse(s)
        .map(|config| config.max_size)
        .ok_or_else(|| format!("invalid size '{}', expected e.g. 1mb, 500kb or 2048", s))
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            workers: self.workers.filter(|n| *n > 0).unwrap_or(defaults.workers),
            sequential: self.sequential,
            header_read_timeout: Duration::from_millis(self.header_timeout_ms),
            body_timeout: Duration::from_millis(self.body_timeout_ms),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            max_body_size: self.max_body_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["pocket"]).unwrap();
        let config = cli.server_config();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert!(!config.sequential);
        assert_eq!(config.max_body_size, 1024 * 1024);
        assert_eq!(config.header_read_timeout, Duration::from_secs(5));
        assert_eq!(config.connection_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "pocket",
            "--host",
            "0.0.0.0",
            "--port",
            "8765",
            "--sequential",
            "--workers",
            "2",
            "--max-body-size",
            "64kb",
        ])
        .unwrap();
        let config = cli.server_config();
        assert_eq!(config.display_addr(), "0.0.0.0:8765");
        assert!(config.sequential);
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_body_size, 64 * 1024);
    }

    #[test]
    fn test_rejects_bad_body_size() {
        assert!(Cli::try_parse_from(["pocket", "--max-body-size", "grande"]).is_err());
    }
}
