//! Error types for pocket-core
//!
//! Client-facing variants carry the message that ends up in the `erro`
//! field of the JSON envelope. `Internal` text is only ever logged.

use crate::response::{Response, StatusCode};
use thiserror::Error;

/// Result type alias for pocket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message sent to clients for every 5xx
pub const INTERNAL_ERROR_MESSAGE: &str = "Erro interno do servidor";

/// Error types for the dispatcher and its operations
#[derive(Debug, Error)]
pub enum Error {
    /// Unparsable body, unsupported content type, bad query value
    #[error("{0}")]
    MalformedRequest(String),

    /// Required field missing or a domain check failed
    #[error("{0}")]
    ValidationFailed(String),

    /// Identity lookup failed
    #[error("{0}")]
    NotFound(String),

    /// No route matches the path
    #[error("Rota não encontrada: {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// Path is routed, but not for this method
    #[error("Método {method} não permitido para {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allow: Vec<String>,
    },

    /// Create with an identity that already exists
    #[error("{0}")]
    DuplicateIdentity(String),

    /// Body too large
    #[error("Corpo da requisição excede o limite de {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Client stopped sending the body
    #[error("Tempo esgotado lendo o corpo da requisição")]
    BodyTimeout,

    /// Invalid route pattern at registration time
    #[error("Invalid route: {0}")]
    InvalidRoute(#[from] pocket_router::PatternError),

    /// Route registered for a method that can never be matched
    #[error("Method {method} cannot be routed: {pattern}")]
    UnroutableMethod { method: String, pattern: String },

    /// Listener could not be bound (native only)
    #[cfg(feature = "native")]
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error (native only)
    #[cfg(feature = "native")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hyper error (native only)
    #[cfg(feature = "native")]
    #[error("HTTP error: {0}")]
    Hyper(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Status code this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MalformedRequest(_) | Error::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) | Error::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::DuplicateIdentity(_) => StatusCode::CONFLICT,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::BodyTimeout => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show a client
    pub fn client_message(&self) -> String {
        if self.status_code().is_server_error() {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        let mut response = Response::error(err.status_code(), &err.client_message());
        if let Error::MethodNotAllowed { allow, .. } = &err {
            response.headers.push(("allow".to_string(), allow.join(", ")));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::MalformedRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::ValidationFailed("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::DuplicateIdentity("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            Error::PayloadTooLarge { size: 10, limit: 5 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(Error::BodyTimeout.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(Error::Internal("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_text_is_not_exposed() {
        let response: Response = Error::Internal("lock poisoned at store.rs:42".into()).into();
        let body = response.body_string().unwrap();
        assert!(!body.contains("store.rs"));
        assert_eq!(body, r#"{"erro":"Erro interno do servidor"}"#);
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response: Response = Error::MethodNotAllowed {
            method: "PATCH".into(),
            path: "/tarefa/1".into(),
            allow: vec!["GET".into(), "PUT".into(), "DELETE".into()],
        }
        .into();
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("Allow"), Some("GET, PUT, DELETE"));
        assert_eq!(response.content_type(), Some("application/json"));
    }
}
