//! pocket-core: JSON request dispatcher
//!
//! Routes HTTP requests against an ordered route table to resource
//! operations over in-memory collections, answering every request with a
//! JSON body. The dispatcher itself is synchronous and transport-free; the
//! hyper acceptor lives behind a feature flag.
//!
//! ## Features
//! - `native` - HTTP/1.1 acceptor with tokio/hyper

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod collection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod parser;
pub mod record;
pub mod request;
pub mod response;

#[cfg(feature = "native")]
pub mod server;

// Re-exports
pub use collection::{Collection, SharedCollection};
pub use dispatcher::{Dispatcher, Input, Operation, Reply};
pub use error::{Error, Result};
pub use record::{FieldKind, FieldSpec, Identity, Key, Record, ResourceSchema};
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};

// Middleware re-exports
pub use middleware::{AccessLog, AccessLogConfig, BodyLimit, BodyLimitConfig, Middleware, MiddlewareChain};

// Handlers re-exports
pub use handlers::{calculate, validate_cpf, Operator};

#[cfg(feature = "native")]
pub use server::{
    bind, create_optimized_socket, from_hyper_parts, serve, serve_with_shutdown, to_hyper_response,
    ConnectionTracker, ServerConfig,
};
