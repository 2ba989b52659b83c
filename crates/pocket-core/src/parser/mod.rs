//! Request input parsing: query strings, form bodies and JSON bodies
//!
//! Everything a handler reads from the client goes through here, so the
//! decoding rules (last duplicate wins, `+` is a space, JSON must be an
//! object) live in one place.

mod method;

pub use method::Method;

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Content types the dispatcher understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
}

impl BodyKind {
    /// Classify a `Content-Type` header value. `None` means "no header".
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self> {
        let Some(value) = content_type else {
            return Ok(BodyKind::Json);
        };
        let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "application/json" | "" => Ok(BodyKind::Json),
            "application/x-www-form-urlencoded" => Ok(BodyKind::Form),
            other => Err(Error::MalformedRequest(format!(
                "Content-Type não suportado: {}",
                other
            ))),
        }
    }
}

/// Decode `a=1&b=2` into a map. Later duplicates replace earlier ones.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Percent-decode one path segment (`+` stays a plus)
pub fn decode_path_segment(segment: &str) -> Result<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|_| Error::MalformedRequest("Caminho com codificação inválida".to_string()))
}

/// Parse a request body into a field map
///
/// An empty body yields `None`; callers decide whether that is an error.
pub fn parse_body(body: &[u8], kind: BodyKind) -> Result<Option<Map<String, Value>>> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }

    match kind {
        BodyKind::Form => {
            let fields = url::form_urlencoded::parse(body)
                .into_owned()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            Ok(Some(fields))
        }
        BodyKind::Json => {
            let value: Value = serde_json::from_slice(body)
                .map_err(|e| Error::MalformedRequest(format!("JSON inválido: {}", e)))?;
            match value {
                Value::Object(map) => Ok(Some(map)),
                _ => Err(Error::MalformedRequest(
                    "O corpo JSON deve ser um objeto".to_string(),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_last_duplicate_wins() {
        let params = parse_query("id=1&titulo=a&id=2");
        assert_eq!(params.get("id"), Some(&"2".to_string()));
        assert_eq!(params.get("titulo"), Some(&"a".to_string()));
    }

    #[test]
    fn test_query_decoding() {
        let params = parse_query("nome=Jo%C3%A3o+Silva&email=a%40b.com&vazio=");
        assert_eq!(params.get("nome"), Some(&"João Silva".to_string()));
        assert_eq!(params.get("email"), Some(&"a@b.com".to_string()));
        assert_eq!(params.get("vazio"), Some(&String::new()));
    }

    #[test]
    fn test_decode_path_segment() {
        assert_eq!(decode_path_segment("ana%40exemplo.com").unwrap(), "ana@exemplo.com");
        assert_eq!(decode_path_segment("a+b").unwrap(), "a+b");
        assert!(decode_path_segment("%FF").is_err());
    }

    #[test]
    fn test_body_kind() {
        assert_eq!(BodyKind::from_content_type(None).unwrap(), BodyKind::Json);
        assert_eq!(
            BodyKind::from_content_type(Some("application/json; charset=utf-8")).unwrap(),
            BodyKind::Json
        );
        assert_eq!(
            BodyKind::from_content_type(Some("application/x-www-form-urlencoded")).unwrap(),
            BodyKind::Form
        );
        assert!(BodyKind::from_content_type(Some("text/xml")).is_err());
    }

    #[test]
    fn test_parse_json_body() {
        let fields = parse_body(br#"{"titulo":"Estudar"}"#, BodyKind::Json).unwrap().unwrap();
        assert_eq!(fields.get("titulo"), Some(&Value::from("Estudar")));

        assert!(parse_body(b"", BodyKind::Json).unwrap().is_none());
        assert!(parse_body(b"  \r\n", BodyKind::Json).unwrap().is_none());
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = parse_body(br#"{"titulo":"#, BodyKind::Json).unwrap_err();
        assert!(matches!(err, Error::MalformedRequest(_)));

        let err = parse_body(b"[1,2,3]", BodyKind::Json).unwrap_err();
        assert!(matches!(err, Error::MalformedRequest(_)));
    }

    #[test]
    fn test_parse_form_body() {
        let fields = parse_body(b"titulo=Ler+livro&concluida=true", BodyKind::Form)
            .unwrap()
            .unwrap();
        assert_eq!(fields.get("titulo"), Some(&Value::from("Ler livro")));
        assert_eq!(fields.get("concluida"), Some(&Value::from("true")));
    }
}
