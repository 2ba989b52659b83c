//! Four-operation calculator
//!
//! `GET /calcular?a=10&b=4&op=divisao` → `{"resultado": 2.5}`

use super::required_text;
use crate::dispatcher::{Input, Reply};
use crate::{Error, Result};
use serde_json::json;
use std::str::FromStr;

/// Supported operators, named as they appear in `op`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Soma,
    Subtracao,
    Multiplicacao,
    Divisao,
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soma" => Ok(Operator::Soma),
            "subtracao" => Ok(Operator::Subtracao),
            "multiplicacao" => Ok(Operator::Multiplicacao),
            "divisao" => Ok(Operator::Divisao),
            other => Err(Error::ValidationFailed(format!("Operação inválida: '{}'", other))),
        }
    }
}

/// Apply `op` to the operands
pub fn calculate(a: f64, b: f64, op: Operator) -> Result<f64> {
    let result = match op {
        Operator::Soma => a + b,
        Operator::Subtracao => a - b,
        Operator::Multiplicacao => a * b,
        Operator::Divisao if b == 0.0 => {
            return Err(Error::ValidationFailed("Divisão por zero".to_string()))
        }
        Operator::Divisao => a / b,
    };
    if !result.is_finite() {
        return Err(Error::ValidationFailed("Resultado fora do intervalo".to_string()));
    }
    Ok(result)
}

fn operand(input: &Input, field: &str) -> Result<f64> {
    let text = required_text(input, field)?;
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| Error::ValidationFailed(format!("O campo '{}' deve ser um número", field)))
}

/// `GET /calcular` operation
pub fn calculate_operation(input: &Input) -> Result<Reply> {
    let a = operand(input, "a")?;
    let b = operand(input, "b")?;
    let op: Operator = required_text(input, "op")?.parse()?;
    let resultado = calculate(a, b, op)?;
    Ok(Reply::ok(json!({ "resultado": resultado })))
}
