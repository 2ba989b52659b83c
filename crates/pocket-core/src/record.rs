//! Resource records and the schema that shapes them
//!
//! A record is a flat JSON object: field name → scalar. The schema says
//! which fields exist, their kinds, which one is the identity, and the
//! human-facing messages used for this resource.

use crate::{Error, Result};
use serde_json::{Map, Number, Value};
use std::fmt;

/// One entity instance. Field order follows the schema.
pub type Record = Map<String, Value>;

/// Scalar kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "um texto",
            FieldKind::Integer => "um número inteiro",
            FieldKind::Float => "um número",
            FieldKind::Boolean => "um booleano",
        }
    }

    /// Coerce an input value to this kind
    ///
    /// Text input (query strings, forms, or JSON strings) is parsed; JSON
    /// scalars must already have a compatible type. `Ok(None)` means the
    /// value is absent (`null`).
    pub fn coerce(self, field: &str, value: &Value) -> Result<Option<Value>> {
        let mismatch = || Error::ValidationFailed(format!("O campo '{}' deve ser {}", field, self.describe()));

        let coerced = match (self, value) {
            (_, Value::Null) => return Ok(None),
            (FieldKind::Text, Value::String(s)) => Value::String(s.clone()),
            (FieldKind::Text, Value::Number(n)) => Value::String(n.to_string()),
            (FieldKind::Text, Value::Bool(b)) => Value::String(b.to_string()),

            (FieldKind::Integer, Value::Number(n)) => {
                Value::Number(n.as_i64().map(Number::from).ok_or_else(mismatch)?)
            }
            (FieldKind::Integer, Value::String(s)) => {
                Value::from(s.trim().parse::<i64>().map_err(|_| mismatch())?)
            }

            (FieldKind::Float, Value::Number(n)) => {
                Value::Number(n.as_f64().and_then(Number::from_f64).ok_or_else(mismatch)?)
            }
            (FieldKind::Float, Value::String(s)) => {
                let parsed = s.trim().parse::<f64>().map_err(|_| mismatch())?;
                Value::Number(Number::from_f64(parsed).ok_or_else(mismatch)?)
            }

            (FieldKind::Boolean, Value::Bool(b)) => Value::Bool(*b),
            (FieldKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(mismatch()),
            },

            _ => return Err(mismatch()),
        };
        Ok(Some(coerced))
    }
}

/// Field definition
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Value stored when an optional field is not supplied on create
    pub default: Option<Value>,
}

impl FieldSpec {
    /// Required field
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    /// Optional field, omitted from the record when not supplied
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
        }
    }

    /// Optional field with a default
    pub fn with_default(name: impl Into<String>, kind: FieldKind, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: Some(default.into()),
        }
    }
}

/// How a resource identifies its records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Server-assigned, auto-incrementing integer
    Auto { field: String },
    /// Caller-supplied unique text key
    Natural { field: String },
}

impl Identity {
    pub fn field(&self) -> &str {
        match self {
            Identity::Auto { field } | Identity::Natural { field } => field,
        }
    }

    /// Parse an identity from text (path parameter or query value)
    pub fn parse_key(&self, raw: &str) -> Result<Key> {
        match self {
            Identity::Auto { field } => raw
                .trim()
                .parse::<u64>()
                .map(Key::Id)
                .map_err(|_| Error::ValidationFailed(format!("O campo '{}' deve ser um número inteiro", field))),
            Identity::Natural { .. } => Ok(Key::Name(raw.trim().to_string())),
        }
    }
}

/// Identity value of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Id(u64),
    Name(String),
}

impl Key {
    /// Read the identity back out of a stored record
    pub fn of(record: &Record, identity: &Identity) -> Option<Key> {
        match (identity, record.get(identity.field())?) {
            (Identity::Auto { .. }, Value::Number(n)) => n.as_u64().map(Key::Id),
            (Identity::Natural { .. }, Value::String(s)) => Some(Key::Name(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Id(id) => Value::from(*id),
            Key::Name(name) => Value::String(name.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "{}", id),
            Key::Name(name) => f.write_str(name),
        }
    }
}

/// Human-facing messages for one resource
#[derive(Debug, Clone)]
pub struct Messages {
    pub deleted: String,
    pub not_found: String,
    pub duplicate: String,
}

impl Messages {
    fn for_label(label: &str) -> Self {
        Self {
            deleted: format!("{} deletado com sucesso", label),
            not_found: format!("{} não encontrado", label),
            duplicate: format!("{} já cadastrado", label),
        }
    }
}

/// Shape of one resource collection
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    /// Path segment, e.g. `tarefa`
    pub name: String,
    /// Key of the list envelope, e.g. `tarefas`
    pub plural: String,
    /// Name used in messages, e.g. `Tarefa`
    pub label: String,
    pub identity: Identity,
    pub fields: Vec<FieldSpec>,
    pub messages: Messages,
}

impl ResourceSchema {
    /// Schema with an auto-increment `id`
    pub fn new(name: impl Into<String>, plural: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: name.into(),
            plural: plural.into(),
            messages: Messages::for_label(&label),
            label,
            identity: Identity::Auto { field: "id".to_string() },
            fields: Vec::new(),
        }
    }

    /// Use a caller-supplied text key instead of an auto id
    pub fn natural_key(mut self, field: impl Into<String>) -> Self {
        self.identity = Identity::Natural { field: field.into() };
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn deleted_message(mut self, message: impl Into<String>) -> Self {
        self.messages.deleted = message.into();
        self
    }

    pub fn not_found_message(mut self, message: impl Into<String>) -> Self {
        self.messages.not_found = message.into();
        self
    }

    pub fn duplicate_message(mut self, message: impl Into<String>) -> Self {
        self.messages.duplicate = message.into();
        self
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Coerce and check every supplied field against the schema
    ///
    /// The identity field is skipped; callers handle it. Blank text is kept
    /// here as `""` so callers can apply their own blank-means-unset rule.
    pub fn coerce_fields(&self, input: &Map<String, Value>) -> Result<Map<String, Value>> {
        let identity = self.identity.field();
        let mut out = Map::new();

        for (name, value) in input {
            if name == identity {
                continue;
            }
            let spec = self
                .field_spec(name)
                .ok_or_else(|| Error::ValidationFailed(format!("Campo desconhecido: '{}'", name)))?;
            if is_blank(value) {
                out.insert(name.clone(), Value::String(String::new()));
                continue;
            }
            if let Some(coerced) = spec.kind.coerce(name, value)? {
                out.insert(name.clone(), coerced);
            }
        }
        Ok(out)
    }
}

/// Blank text counts as "not supplied"
pub fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tarefa() -> ResourceSchema {
        ResourceSchema::new("tarefa", "tarefas", "Tarefa")
            .field(FieldSpec::required("titulo", FieldKind::Text))
            .field(FieldSpec::with_default("concluida", FieldKind::Boolean, false))
            .field(FieldSpec::optional("prioridade", FieldKind::Integer))
            .field(FieldSpec::optional("horas", FieldKind::Float))
    }

    #[test]
    fn test_coerce_text_input() {
        assert_eq!(FieldKind::Integer.coerce("x", &json!("42")).unwrap(), Some(json!(42)));
        assert_eq!(FieldKind::Boolean.coerce("x", &json!("true")).unwrap(), Some(json!(true)));
        assert_eq!(FieldKind::Boolean.coerce("x", &json!("0")).unwrap(), Some(json!(false)));
        assert_eq!(FieldKind::Float.coerce("x", &json!("1.5")).unwrap(), Some(json!(1.5)));
        assert_eq!(FieldKind::Text.coerce("x", &json!(7)).unwrap(), Some(json!("7")));
        assert_eq!(FieldKind::Text.coerce("x", &Value::Null).unwrap(), None);
    }

    #[test]
    fn test_float_has_one_representation() {
        let from_json = FieldKind::Float.coerce("horas", &json!(2)).unwrap().unwrap();
        let from_text = FieldKind::Float.coerce("horas", &json!("2")).unwrap().unwrap();
        assert_eq!(from_json, from_text);
        assert!(from_json.is_f64());
        assert_eq!(from_json.to_string(), "2.0");
    }

    #[test]
    fn test_coerce_rejects_mismatch() {
        assert!(FieldKind::Integer.coerce("prioridade", &json!("alta")).is_err());
        assert!(FieldKind::Integer.coerce("prioridade", &json!(1.5)).is_err());
        assert!(FieldKind::Boolean.coerce("concluida", &json!("talvez")).is_err());
        assert!(FieldKind::Boolean.coerce("concluida", &json!(1)).is_err());
        assert!(FieldKind::Float.coerce("horas", &json!("NaN")).is_err());

        let err = FieldKind::Integer.coerce("prioridade", &json!(true)).unwrap_err();
        assert_eq!(err.to_string(), "O campo 'prioridade' deve ser um número inteiro");
    }

    #[test]
    fn test_coerce_fields_rejects_unknown() {
        let input = json!({"titulo": "a", "cor": "azul"});
        let err = tarefa().coerce_fields(input.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }

    #[test]
    fn test_coerce_fields_skips_identity_and_keeps_blank() {
        let input = json!({"id": 9, "titulo": "  ", "prioridade": "3"});
        let out = tarefa().coerce_fields(input.as_object().unwrap()).unwrap();
        assert!(out.get("id").is_none());
        assert_eq!(out["titulo"], json!(""));
        assert_eq!(out["prioridade"], json!(3));
    }

    #[test]
    fn test_identity_keys() {
        let auto = Identity::Auto { field: "id".into() };
        assert_eq!(auto.parse_key("12").unwrap(), Key::Id(12));
        assert!(auto.parse_key("doze").is_err());

        let natural = Identity::Natural { field: "email".into() };
        assert_eq!(natural.parse_key("a@b.com").unwrap(), Key::Name("a@b.com".into()));
        assert_eq!(natural.parse_key("  a@b.com ").unwrap(), Key::Name("a@b.com".into()));

        let record = json!({"email": "a@b.com"});
        assert_eq!(
            Key::of(record.as_object().unwrap(), &natural),
            Some(Key::Name("a@b.com".into()))
        );
    }

    #[test]
    fn test_default_messages() {
        let schema = ResourceSchema::new("usuario", "usuarios", "Usuário");
        assert_eq!(schema.messages.deleted, "Usuário deletado com sucesso");
        assert_eq!(schema.messages.not_found, "Usuário não encontrado");

        let schema = schema.deleted_message("Removido");
        assert_eq!(schema.messages.deleted, "Removido");
    }
}
