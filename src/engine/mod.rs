//! Shape generation, parameter parsing and model construction for one entity type.

pub mod copier;
pub mod params;
pub mod shape;

pub use params::Params;
pub use shape::{Shape, ShapeKind, LANGUAGE_FILTER_KEY};

use crate::case::query_keys_to_snake_case;
use crate::error::{EngineError, ParseError, ShapeError};
use crate::orm::{merge_contents, ContentRecord};
use crate::repository::Scope;
use crate::schema::{Entity, Field, ModelSchema};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Stateless per-type engine; all type information comes from `T::schema()`.
pub struct Engine<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Default for Engine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Engine<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> Engine<T> {
    pub fn schema(&self) -> &'static ModelSchema {
        T::schema()
    }

    pub fn create_shape(&self) -> Result<Shape, ShapeError> {
        shape::create_shape(T::schema())
    }

    pub fn update_shape(&self) -> Result<Shape, ShapeError> {
        shape::update_shape(T::schema())
    }

    pub fn filter_shape(&self) -> Result<Shape, ShapeError> {
        shape::filter_shape(T::schema())
    }

    pub fn parse_params(&self, shape: &Shape, body: &Value) -> Result<Params, ParseError> {
        params::parse_body(shape, body)
    }

    /// Query string to scopes. Keys are normalized to snake_case first;
    /// `limit` and `offset` become paging scopes.
    pub fn parse_filter(
        &self,
        shape: &Shape,
        query: &HashMap<String, String>,
    ) -> Result<Vec<Scope>, ParseError> {
        let query = query_keys_to_snake_case(query);
        let params = params::parse_query(shape, &query)?;
        let schema = T::schema();

        let mut scopes = Vec::new();
        for field in shape.fields() {
            let Some(value) = params.get(&field.key) else {
                continue;
            };
            let column = field.name.clone();
            let value = value.clone();
            if schema.columns().any(|c| c.name == field.name) {
                scopes.push(Scope::Where { column, value });
            } else {
                scopes.push(Scope::ContentWhere { column, value });
            }
        }

        if let Some(raw) = query.get("limit") {
            scopes.push(Scope::Limit(paging("limit", raw)?));
        }
        if let Some(raw) = query.get("offset") {
            scopes.push(Scope::Offset(paging("offset", raw)?));
        }
        Ok(scopes)
    }

    /// A zero-valued `T` with every present parameter copied onto it.
    pub fn build_from_create_params(&self, params: &Params) -> Result<T, EngineError> {
        let model_type = &T::schema().record;
        if let Some(field) = params
            .shape
            .fields()
            .iter()
            .find(|f| model_type.get(&f.name).is_none())
        {
            return Err(EngineError::FieldNotSettable(field.name.clone()));
        }

        let mut record = encode(&T::default())?;
        copier::copy(&mut record, model_type, &params.values, &params.shape.record)?;
        decode(record)
    }

    /// Copies every non-null parameter onto `model`. The contents collection
    /// is merged by language instead of replaced.
    pub fn apply_update_params(&self, model: T, params: &Params) -> Result<T, EngineError> {
        let schema = T::schema();
        let contents = schema.contents_field();
        let mut record = encode(&model)?;

        for src_field in params.shape.fields() {
            let Some(value) = params.get(&src_field.key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(dst_field) = schema.record.get(&src_field.name) else {
                return Err(EngineError::FieldNotSettable(src_field.name.clone()));
            };
            match contents {
                Some(contents) if contents.name == dst_field.name => {
                    merge_field(&mut record, dst_field, src_field, value)?;
                }
                _ => copier::copy_field(&mut record, dst_field, src_field, value, "")?,
            }
        }

        decode(record)
    }
}

/// Contents merge: incoming entries are built from the content zero value,
/// then merged over the stored ones by language id.
fn merge_field(
    record: &mut Map<String, Value>,
    dst_field: &Field,
    src_field: &Field,
    value: &Value,
) -> Result<(), EngineError> {
    let (Some(element), Some(src_element)) = (dst_field.ty.list_record(), src_field.ty.list_record())
    else {
        return copier::copy_field(record, dst_field, src_field, value, "").map_err(Into::into);
    };
    let language_key = element.language_key.clone().unwrap_or_default();

    let mut incoming = Vec::new();
    for (i, item) in value.as_array().into_iter().flatten().enumerate() {
        let Value::Object(item) = item else {
            continue;
        };
        let mut target = element.zero_value();
        let path = format!("{}[{i}]", src_field.name);
        copier::copy_at(&mut target, element, item, src_element, &path)?;
        incoming.push(ContentRecord::new(target, &language_key));
    }

    let current = match record.remove(&dst_field.key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(ContentRecord::new(map, &language_key)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let merged: Vec<Value> = merge_contents(current, incoming)
        .into_iter()
        .map(|c| Value::Object(c.into_fields()))
        .collect();
    record.insert(dst_field.key.clone(), Value::Array(merged));
    Ok(())
}

fn paging(key: &str, raw: &str) -> Result<u32, ParseError> {
    raw.parse().map_err(|_| ParseError::InvalidValue {
        field: key.to_string(),
        reason: format!("'{raw}' is not a non-negative integer"),
    })
}

fn encode<T: Entity>(model: &T) -> Result<Map<String, Value>, EngineError> {
    match serde_json::to_value(model).map_err(EngineError::Encode)? {
        Value::Object(map) => Ok(map),
        _ => Err(EngineError::Encode(serde::ser::Error::custom(
            "model did not serialize to an object",
        ))),
    }
}

fn decode<T: Entity>(record: Map<String, Value>) -> Result<T, EngineError> {
    serde_json::from_value(Value::Object(record)).map_err(EngineError::Decode)
}
