//! Base models shared by every entity, and the language-keyed content merge.

use crate::schema::{
    BaseField, ColumnOptions, Field, FieldRole, FieldType, LanguageTagged, Record, RecordType,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

fn timestamp(name: &str, base: BaseField) -> Field {
    Field::new(name, FieldType::Timestamp)
        .with_role(FieldRole::Base(base))
        .with_column(ColumnOptions {
            default: Some("NOW()".into()),
            ..ColumnOptions::default()
        })
}

/// Identity plus creation/update timestamps. Embed with
/// `#[serde(flatten)] #[crud(base)]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Model {
    fn record_type() -> Arc<RecordType> {
        static RECORD: OnceLock<Arc<RecordType>> = OnceLock::new();
        RECORD
            .get_or_init(|| {
                let record = RecordType::new("Model")
                    .field(Field::new("id", FieldType::Int).with_role(FieldRole::Base(BaseField::Id)))
                    .field(timestamp("created_at", BaseField::CreatedAt))
                    .field(timestamp("updated_at", BaseField::UpdatedAt));
                Arc::new(record)
            })
            .clone()
    }
}

/// Localized sub-record base. Embed with `#[serde(flatten)] #[crud(content_base)]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentModel {
    pub language_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentModel {
    pub fn is_contained(&self, contents: &[ContentModel]) -> bool {
        is_content_contained(self, contents)
    }
}

impl LanguageTagged for ContentModel {
    fn language_id(&self) -> &str {
        &self.language_id
    }
}

impl Record for ContentModel {
    fn record_type() -> Arc<RecordType> {
        static RECORD: OnceLock<Arc<RecordType>> = OnceLock::new();
        RECORD
            .get_or_init(|| {
                let record = RecordType::new("ContentModel")
                    .field(
                        Field::new("language_id", FieldType::Text)
                            .with_role(FieldRole::Base(BaseField::LanguageId))
                            .with_column(ColumnOptions {
                                sql_type: Some("varchar(2)".into()),
                                index: true,
                                ..ColumnOptions::default()
                            }),
                    )
                    .field(timestamp("created_at", BaseField::CreatedAt))
                    .field(timestamp("updated_at", BaseField::UpdatedAt));
                Arc::new(record)
            })
            .clone()
    }
}

/// A supported language ("en", "ar", ...). Reference data only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Language {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Merges two content collections by language id; `incoming` wins on
/// shared keys. One entry per language, in first-seen order.
pub fn merge_contents<C, I, J>(current: I, incoming: J) -> Vec<C>
where
    C: LanguageTagged,
    I: IntoIterator<Item = C>,
    J: IntoIterator<Item = C>,
{
    let mut merged: IndexMap<String, C> = IndexMap::new();
    for content in current.into_iter().chain(incoming) {
        merged.insert(content.language_id().to_string(), content);
    }
    merged.into_values().collect()
}

/// A content entry held as a JSON record, tagged by its language value.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentRecord {
    language_id: String,
    fields: Map<String, Value>,
}

impl ContentRecord {
    pub fn new(fields: Map<String, Value>, language_key: &str) -> Self {
        let language_id = fields
            .get(language_key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            language_id,
            fields,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl LanguageTagged for ContentRecord {
    fn language_id(&self) -> &str {
        &self.language_id
    }
}

pub fn is_content_contained<C: LanguageTagged>(content: &C, contents: &[C]) -> bool {
    contents
        .iter()
        .any(|c| c.language_id() == content.language_id())
}

/// Converts loosely typed JSON objects into content models. Keys the target
/// knows are copied over its zero value; anything else is ignored.
pub fn extract_contents<C>(records: &[Value]) -> Result<Vec<C>, serde_json::Error>
where
    C: Default + Serialize + DeserializeOwned,
{
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let mut target = serde_json::to_value(C::default())?;
        if let (Value::Object(dst), Value::Object(src)) = (&mut target, record) {
            for (key, value) in src {
                if let Some(slot) = dst.get_mut(key) {
                    *slot = value.clone();
                }
            }
        }
        out.push(serde_json::from_value(target)?);
    }
    Ok(out)
}
