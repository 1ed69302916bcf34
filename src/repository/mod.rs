//! Persistence interface for entities, with PostgreSQL and in-memory backends.

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use crate::error::AppError;
use crate::schema::{Entity, ModelSchema};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Largest page [`Scope::Limit`] can ask for; bigger limits are clamped.
pub const MAX_LIMIT: u32 = 1000;

/// Composable query modifier applied by [`Repository::get_all`].
#[derive(Clone, Debug, PartialEq)]
pub enum Scope {
    /// Equality on a column of the model's own table.
    Where { column: String, value: Value },
    /// Matches models having at least one content row with this column value.
    ContentWhere { column: String, value: Value },
    Limit(u32),
    Offset(u32),
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<T, AppError>;

    /// Ordered by id.
    async fn get_all(&self, scopes: &[Scope]) -> Result<Vec<T>, AppError>;

    async fn create(&self, model: T) -> Result<T, AppError>;

    /// Full save of the parent; contents are upserted by language.
    async fn update(&self, model: T) -> Result<T, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    fn has_contents(&self) -> bool {
        T::schema().has_contents()
    }
}

pub(crate) fn to_record<T: Entity>(model: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(model).map_err(AppError::Decode)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Decode(serde::de::Error::custom(format!(
            "expected an object, got {other}"
        )))),
    }
}

pub(crate) fn from_record<T: Entity>(record: Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(record)).map_err(AppError::Decode)
}

pub(crate) fn record_id(schema: &ModelSchema, record: &Map<String, Value>) -> i64 {
    schema
        .id_field()
        .and_then(|f| record.get(&f.key))
        .and_then(Value::as_i64)
        .unwrap_or_default()
}

/// Content rows of `record`, or nothing when the model has no contents.
pub(crate) fn content_rows(schema: &ModelSchema, record: &Map<String, Value>) -> Vec<Map<String, Value>> {
    let Some(field) = schema.contents_field() else {
        return Vec::new();
    };
    match record.get(&field.key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    }
}
