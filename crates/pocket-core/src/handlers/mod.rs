//! Built-in resource operations
//!
//! CRUD over a [`Collection`](crate::Collection), the CPF check-digit
//! validator and the four-operation calculator.

pub mod calculator;
pub mod cpf;
pub mod crud;

pub use calculator::{calculate, Operator};
pub use cpf::validate_cpf;

use crate::dispatcher::Input;
use crate::{Error, Result};
use serde_json::Value;

/// Text of a required input value, or a 400 naming the field
pub(crate) fn required_text(input: &Input, field: &str) -> Result<String> {
    let missing = || Error::ValidationFailed(format!("O campo '{}' é obrigatório", field));
    match input.value(field) {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::String(s)) if s.trim().is_empty() => Err(missing()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(Error::ValidationFailed(format!(
            "O campo '{}' deve ser um texto",
            field
        ))),
    }
}
