//! Value Coercion - declared property types to bind values and back
//!
//! All string-vs-number ambiguity is settled here: [`coerce`] prepares bind values,
//! [`decode`] turns column values back into entity values, and [`parse_number`] is the
//! single rule for "numeric-looking" strings used by list filters.

use serde_json::{Number, Value};

use crate::descriptor::PropertyType;
use crate::error::{DaoError, DaoResult};

/// Database value enumeration for parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Json(Value),
}

impl DatabaseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> Value {
        match self {
            DatabaseValue::Null => Value::Null,
            DatabaseValue::Bool(b) => Value::Bool(*b),
            DatabaseValue::Int64(i) => Value::Number(Number::from(*i)),
            DatabaseValue::Float64(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            DatabaseValue::String(s) => Value::String(s.clone()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }

    /// Create a DatabaseValue from a JSON value without any type hint
    pub fn from_json(json: &Value) -> Self {
        match json {
            Value::Null => DatabaseValue::Null,
            Value::Bool(b) => DatabaseValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DatabaseValue::Int64(i),
                None => n.as_f64().map_or(DatabaseValue::Null, DatabaseValue::Float64),
            },
            Value::String(s) => DatabaseValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => DatabaseValue::Json(json.clone()),
        }
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

/// A coerced value together with the declared type of its placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub property_type: PropertyType,
    pub value: DatabaseValue,
}

impl BoundParameter {
    pub fn new(property_type: PropertyType, value: DatabaseValue) -> Self {
        Self { property_type, value }
    }
}

fn coercion_failed(property_type: PropertyType, raw: &Value) -> DaoError {
    DaoError::CoercionFailed {
        property_type,
        value: raw.to_string(),
    }
}

/// Parse a numeric-looking string; `None` when it is not a number
pub fn parse_number(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

/// Coerce a raw entity value to the bind value for a property of `property_type`
///
/// Null stays null (unset). INTEGER parses to an integer, truncating fractions;
/// DOUBLE/FLOAT parse to floating point; BOOLEAN canonicalizes to `"true"`/`"false"`;
/// everything else passes through unchanged.
pub fn coerce(property_type: PropertyType, raw: &Value) -> DaoResult<DatabaseValue> {
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    match property_type {
        PropertyType::Integer => {
            let number = match raw {
                Value::Number(n) => Some(n.clone()),
                Value::String(s) => parse_number(s),
                _ => None,
            }
            .ok_or_else(|| coercion_failed(property_type, raw))?;
            match number.as_i64() {
                Some(i) => Ok(DatabaseValue::Int64(i)),
                None => number
                    .as_f64()
                    .filter(|f| f.abs() < i64::MAX as f64)
                    .map(|f| DatabaseValue::Int64(f.trunc() as i64))
                    .ok_or_else(|| coercion_failed(property_type, raw)),
            }
        }
        PropertyType::Double | PropertyType::Float => {
            let number = match raw {
                Value::Number(n) => Some(n.clone()),
                Value::String(s) => parse_number(s),
                _ => None,
            };
            number
                .and_then(|n| n.as_f64())
                .map(DatabaseValue::Float64)
                .ok_or_else(|| coercion_failed(property_type, raw))
        }
        PropertyType::Boolean => {
            let flag = match raw {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => n.as_f64().map(|f| f != 0.0),
                Value::String(s) => parse_boolean(s),
                _ => None,
            }
            .ok_or_else(|| coercion_failed(property_type, raw))?;
            Ok(DatabaseValue::String(if flag { "true" } else { "false" }.to_string()))
        }
        _ => Ok(DatabaseValue::from_json(raw)),
    }
}

/// Coerce a primary-key value: numeric unless the key is exactly VARCHAR
pub fn coerce_id(property_type: PropertyType, raw: &Value) -> DaoResult<Value> {
    if raw.is_null() {
        return Err(DaoError::invalid(format!("Illegal argument for id parameter: {}", raw)));
    }
    if property_type == PropertyType::Varchar {
        return Ok(match raw {
            Value::String(_) => raw.clone(),
            other => Value::String(other.to_string()),
        });
    }
    match coerce(PropertyType::Integer, raw) {
        Ok(DatabaseValue::Int64(id)) => Ok(Value::from(id)),
        _ => Err(DaoError::invalid(format!("Illegal argument for id parameter: {}", raw))),
    }
}

/// Decode a column value read from a result row into the entity value
///
/// Null decodes to `None` (unset). Values that do not fit the declared type are
/// returned as read.
pub fn decode(property_type: PropertyType, raw: Value) -> Option<Value> {
    match (property_type, raw) {
        (_, Value::Null) => None,
        (PropertyType::Boolean, Value::String(s)) => match parse_boolean(&s) {
            Some(flag) => Some(Value::Bool(flag)),
            None => Some(Value::String(s)),
        },
        (PropertyType::Boolean, Value::Number(n)) => Some(Value::Bool(n.as_f64().map_or(false, |f| f != 0.0))),
        (
            PropertyType::Integer
            | PropertyType::Bigint
            | PropertyType::Smallint
            | PropertyType::Double
            | PropertyType::Float,
            Value::String(s),
        ) => match parse_number(&s) {
            Some(n) => Some(Value::Number(n)),
            None => Some(Value::String(s)),
        },
        (_, value) => Some(value),
    }
}
