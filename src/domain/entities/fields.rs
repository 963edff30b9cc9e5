//! Lenient field extraction for marketplace JSON payloads.
//!
//! Upstream records are loosely typed: identifiers arrive as numbers or
//! strings, prices may be strings, and any field can be missing or `null`.
//! Everything that reads a field out of a raw record goes through here so the
//! coercion rules live in one place.

use serde_json::{Map, Value};

/// Price fields in priority order. The first one present and not `null` wins.
pub const PRICE_FIELDS: [&str; 4] = ["priceWithDisc", "finishedPrice", "totalPrice", "price"];

/// Read the price of a record using [`PRICE_FIELDS`].
///
/// Returns `0.0` when no price field is present or when the winning field
/// cannot be read as a finite number.
pub fn extract_price(object: &Map<String, Value>) -> f64 {
    for field in PRICE_FIELDS {
        match object.get(field) {
            None | Some(Value::Null) => continue,
            Some(value) => return coerce_number(value).unwrap_or(0.0),
        }
    }
    0.0
}

/// Read a number that may be encoded as a JSON number or a numeric string.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Coerce an identifier to its canonical string form.
///
/// `123`, `123.0` and `"123"` all become `"123"`. Empty strings, `null`,
/// booleans and containers are treated as missing.
pub fn coerce_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(n.to_string())
                }
            }
        }
        _ => None,
    }
}

/// Identifier stored under `key`, if any.
pub fn identifier_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(coerce_identifier)
}

/// Non-empty string stored under `key`. Numbers are rendered as text.
pub fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
