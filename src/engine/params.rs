//! Typed parsing of request bodies and query strings against a [`Shape`].

use super::shape::Shape;
use crate::error::ParseError;
use crate::schema::{FieldType, RecordType};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Parsed parameter values, keyed like the shape's fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub shape: Shape,
    pub values: Map<String, Value>,
}

impl Params {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// Keeps the keys `shape` declares and checks each value against its type.
/// Unknown keys are dropped. `null` is accepted anywhere and later skipped.
pub fn parse_body(shape: &Shape, body: &Value) -> Result<Params, ParseError> {
    let Value::Object(object) = body else {
        return Err(ParseError::NotAnObject);
    };
    Ok(Params {
        shape: shape.clone(),
        values: check_record(&shape.record, object, "")?,
    })
}

/// Parses query-string values. Keys are expected in the shape's key form.
pub fn parse_query(shape: &Shape, query: &HashMap<String, String>) -> Result<Params, ParseError> {
    let mut values = Map::new();
    for field in shape.fields() {
        let Some(raw) = query.get(&field.key) else {
            continue;
        };
        values.insert(field.key.clone(), parse_scalar(&field.key, raw, &field.ty)?);
    }
    Ok(Params {
        shape: shape.clone(),
        values,
    })
}

fn check_record(
    record: &RecordType,
    object: &Map<String, Value>,
    path: &str,
) -> Result<Map<String, Value>, ParseError> {
    let mut out = Map::new();
    for field in &record.fields {
        let Some(value) = object.get(&field.key) else {
            continue;
        };
        let field_path = if path.is_empty() {
            field.key.clone()
        } else {
            format!("{path}.{}", field.key)
        };
        out.insert(field.key.clone(), check_value(value, &field.ty, &field_path)?);
    }
    Ok(out)
}

fn check_value(value: &Value, ty: &FieldType, path: &str) -> Result<Value, ParseError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match (ty.deref(), value) {
        (FieldType::Json, _) => Ok(value.clone()),
        (FieldType::Bool, Value::Bool(_)) | (FieldType::Float, Value::Number(_)) => Ok(value.clone()),
        (FieldType::Text, Value::String(_)) => Ok(value.clone()),
        (FieldType::Int, Value::Number(n)) => n
            .as_i64()
            .map(Value::from)
            .ok_or_else(|| invalid(path, format!("{n} is not an integer"))),
        (FieldType::Timestamp, Value::String(s)) => parse_timestamp(path, s),
        (FieldType::Uuid, Value::String(s)) => parse_uuid(path, s),
        (FieldType::List(element), Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| check_value(item, element, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (FieldType::Record(record), Value::Object(object)) => {
            check_record(record, object, path).map(Value::Object)
        }
        (expected, found) => Err(ParseError::WrongType {
            field: path.to_string(),
            expected: expected.to_string(),
            found: kind(found),
        }),
    }
}

/// Query strings carry scalars only; anything else is rejected.
fn parse_scalar(key: &str, raw: &str, ty: &FieldType) -> Result<Value, ParseError> {
    match ty.deref() {
        FieldType::Bool => match raw {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid(key, format!("'{raw}' is not a boolean"))),
        },
        FieldType::Int => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| invalid(key, e.to_string())),
        FieldType::Float => raw
            .parse::<f64>()
            .map(Value::from)
            .map_err(|e| invalid(key, e.to_string())),
        FieldType::Text => Ok(Value::String(raw.to_string())),
        FieldType::Timestamp => parse_timestamp(key, raw),
        FieldType::Uuid => parse_uuid(key, raw),
        FieldType::Json => serde_json::from_str(raw).map_err(|e| invalid(key, e.to_string())),
        other => Err(invalid(key, format!("{other} cannot be filtered"))),
    }
}

fn parse_timestamp(path: &str, raw: &str) -> Result<Value, ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Value::String(dt.with_timezone(&Utc).to_rfc3339()))
        .map_err(|e| invalid(path, e.to_string()))
}

fn parse_uuid(path: &str, raw: &str) -> Result<Value, ParseError> {
    uuid::Uuid::parse_str(raw)
        .map(|id| Value::String(id.to_string()))
        .map_err(|e| invalid(path, e.to_string()))
}

fn invalid(field: &str, reason: String) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        reason,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
