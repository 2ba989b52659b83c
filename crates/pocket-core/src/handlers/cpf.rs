//! CPF check-digit validation
//!
//! A CPF is eleven digits: nine base digits plus two check digits. Each
//! check digit is the weighted sum of the digits before it, weights
//! counting down to 2, times ten, mod eleven, with 10 folded to 0.
//! Punctuation is ignored, so `111.444.777-35` and `11144477735` are the
//! same number.

use super::required_text;
use crate::dispatcher::{Input, Reply};
use crate::Result;
use serde_json::json;

const CPF_LEN: usize = 11;

fn check_digit(digits: &[u32]) -> u32 {
    let first_weight = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=first_weight).rev())
        .map(|(d, w)| d * w)
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        digit => digit,
    }
}

/// Whether `input` is a CPF with correct check digits
pub fn validate_cpf(input: &str) -> bool {
    let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != CPF_LEN {
        return false;
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// `GET|POST /validar-cpf` operation
pub fn validate(input: &Input) -> Result<Reply> {
    let cpf = required_text(input, "cpf")?;
    let valido = validate_cpf(&cpf);
    tracing::debug!(valido, "cpf checked");
    Ok(Reply::ok(json!({ "cpf": cpf, "valido": valido })))
}
