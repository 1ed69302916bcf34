//! In-process repository. Same contract as [`PgRepository`](super::PgRepository):
//! id sequence, database-managed timestamps, content upsert by language.

use super::{content_rows, from_record, record_id, to_record, Repository, Scope, MAX_LIMIT};
use crate::error::AppError;
use crate::orm::{merge_contents, ContentRecord};
use crate::schema::{BaseField, Entity, LanguageTagged, ModelSchema, RecordType};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::RwLock;

#[derive(Default)]
struct State {
    last_id: i64,
    rows: BTreeMap<i64, Map<String, Value>>,
}

pub struct MemoryRepository<T> {
    state: RwLock<State>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> MemoryRepository<T> {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn not_found(id: i64) -> AppError {
        AppError::NotFound(format!("{} {id}", T::schema().name()))
    }

    /// Stamps the parent and its content rows. `stored` is the previous
    /// version on update; its creation times are kept.
    fn stamp(
        schema: &ModelSchema,
        record: &mut Map<String, Value>,
        id: i64,
        stored: Option<&Map<String, Value>>,
    ) {
        let now = now();
        if let Some(field) = schema.id_field() {
            record.insert(field.key.clone(), Value::from(id));
        }
        set_timestamps(&schema.record, record, stored, &now);

        let (Some(contents), Some(field)) = (&schema.contents, schema.contents_field()) else {
            return;
        };
        let content_type = &contents.schema.record;
        let language_key = content_type.language_key.clone().unwrap_or_default();
        let fk_key = content_type
            .get(&contents.foreign_key)
            .map(|f| f.key.clone());

        let existing: Vec<ContentRecord> = stored
            .map(|s| content_rows(schema, s))
            .unwrap_or_default()
            .into_iter()
            .map(|row| ContentRecord::new(row, &language_key))
            .collect();

        let incoming: Vec<ContentRecord> = content_rows(schema, record)
            .into_iter()
            .map(|mut row| {
                let language = row
                    .get(&language_key)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let previous = existing
                    .iter()
                    .find(|c| c.language_id() == language)
                    .map(ContentRecord::fields);
                set_timestamps(content_type, &mut row, previous, &now);
                if let Some(fk_key) = &fk_key {
                    row.insert(fk_key.clone(), Value::from(id));
                }
                ContentRecord::new(row, &language_key)
            })
            .collect();

        let merged: Vec<Value> = merge_contents(existing, incoming)
            .into_iter()
            .map(|c| Value::Object(c.into_fields()))
            .collect();
        record.insert(field.key.clone(), Value::Array(merged));
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn set_timestamps(
    record_type: &RecordType,
    record: &mut Map<String, Value>,
    stored: Option<&Map<String, Value>>,
    now: &Value,
) {
    if let Some(field) = record_type.base(BaseField::CreatedAt) {
        let created = stored
            .and_then(|s| s.get(&field.key))
            .cloned()
            .unwrap_or_else(|| now.clone());
        record.insert(field.key.clone(), created);
    }
    if let Some(field) = record_type.base(BaseField::UpdatedAt) {
        record.insert(field.key.clone(), now.clone());
    }
}

/// Equality used by scopes. Numbers compare numerically and timestamps
/// as instants; everything else compares as JSON.
fn matches(stored: Option<&Value>, wanted: &Value) -> bool {
    let Some(stored) = stored else {
        return wanted.is_null();
    };
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) if a != b => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        _ => stored == wanted,
    }
}

fn scoped(schema: &ModelSchema, record: &Map<String, Value>, scope: &Scope) -> bool {
    match scope {
        Scope::Where { column, value } => {
            let key = schema.record.get(column).map_or(column.as_str(), |f| f.key.as_str());
            matches(record.get(key), value)
        }
        Scope::ContentWhere { column, value } => {
            let Some(contents) = &schema.contents else {
                return false;
            };
            let content_type = &contents.schema.record;
            let key = content_type.get(column).map_or(column.as_str(), |f| f.key.as_str());
            content_rows(schema, record)
                .iter()
                .any(|row| matches(row.get(key), value))
        }
        Scope::Limit(_) | Scope::Offset(_) => true,
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn get_by_id(&self, id: i64) -> Result<T, AppError> {
        let record = self.read().rows.get(&id).cloned();
        match record {
            Some(record) => from_record(record),
            None => Err(Self::not_found(id)),
        }
    }

    async fn get_all(&self, scopes: &[Scope]) -> Result<Vec<T>, AppError> {
        let schema = T::schema();
        let mut limit = None;
        let mut offset = 0;
        for scope in scopes {
            match scope {
                Scope::Limit(n) => limit = Some((*n).min(MAX_LIMIT) as usize),
                Scope::Offset(n) => offset = *n as usize,
                _ => {}
            }
        }

        let records: Vec<Map<String, Value>> = {
            let state = self.read();
            state
                .rows
                .values()
                .filter(|record| scopes.iter().all(|scope| scoped(schema, record, scope)))
                .skip(offset)
                .take(limit.unwrap_or(usize::MAX))
                .cloned()
                .collect()
        };
        tracing::debug!(model = schema.name(), count = records.len(), "memory get_all");
        records.into_iter().map(from_record).collect()
    }

    async fn create(&self, model: T) -> Result<T, AppError> {
        let schema = T::schema();
        let mut record = to_record(&model)?;
        let stored = {
            let mut state = self.write();
            state.last_id += 1;
            let id = state.last_id;
            Self::stamp(schema, &mut record, id, None);
            state.rows.insert(id, record.clone());
            record
        };
        tracing::debug!(model = schema.name(), model_id = record_id(schema, &stored), "memory create");
        from_record(stored)
    }

    async fn update(&self, model: T) -> Result<T, AppError> {
        let schema = T::schema();
        let mut record = to_record(&model)?;
        let id = record_id(schema, &record);
        let stored = {
            let mut state = self.write();
            let Some(previous) = state.rows.get(&id) else {
                return Err(Self::not_found(id));
            };
            Self::stamp(schema, &mut record, id, Some(previous));
            state.rows.insert(id, record.clone());
            record
        };
        tracing::debug!(model = schema.name(), model_id = id, "memory update");
        from_record(stored)
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        if self.write().rows.remove(&id).is_none() {
            return Err(Self::not_found(id));
        }
        tracing::debug!(model = T::schema().name(), model_id = id, "memory delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{ContentModel, Model};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, crate::Entity)]
    struct Note {
        #[serde(flatten)]
        #[crud(base)]
        model: Model,
        #[crud(contents)]
        contents: Vec<NoteContent>,
        author: String,
        pinned: bool,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, crate::Entity)]
    struct NoteContent {
        #[serde(flatten)]
        #[crud(content_base)]
        content_model: ContentModel,
        body: String,
        note_id: i64,
    }

    fn content(lang: &str, body: &str) -> NoteContent {
        NoteContent {
            content_model: ContentModel {
                language_id: lang.into(),
                ..ContentModel::default()
            },
            body: body.into(),
            note_id: 0,
        }
    }

    fn note(author: &str, contents: Vec<NoteContent>) -> Note {
        Note {
            author: author.into(),
            contents,
            ..Note::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_ids_and_foreign_keys() {
        let repo = MemoryRepository::<Note>::new();
        let first = repo.create(note("a", vec![content("en", "x")])).await.unwrap();
        let second = repo.create(note("b", Vec::new())).await.unwrap();

        assert_eq!(first.model.id, 1);
        assert_eq!(second.model.id, 2);
        assert_eq!(first.contents[0].note_id, 1);
        assert!(first.model.created_at > DateTime::<Utc>::default());
        assert_eq!(repo.get_by_id(1).await.unwrap(), first);
    }

    #[tokio::test]
    async fn update_upserts_contents_by_language() {
        let repo = MemoryRepository::<Note>::new();
        let created = repo
            .create(note("a", vec![content("en", "hello"), content("ar", "marhaba")]))
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.contents = vec![content("en", "hi"), content("fr", "salut")];
        let updated = repo.update(changed).await.unwrap();

        let bodies: Vec<_> = updated
            .contents
            .iter()
            .map(|c| (c.content_model.language_id.as_str(), c.body.as_str()))
            .collect();
        assert_eq!(bodies, [("en", "hi"), ("ar", "marhaba"), ("fr", "salut")]);
        assert_eq!(updated.model.created_at, created.model.created_at);
        assert_eq!(
            updated.contents[0].content_model.created_at,
            created.contents[0].content_model.created_at
        );
        assert!(updated.contents.iter().all(|c| c.note_id == created.model.id));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let repo = MemoryRepository::<Note>::new();
        assert!(repo.get_by_id(9).await.unwrap_err().is_not_found());
        let mut ghost = note("ghost", Vec::new());
        ghost.model.id = 9;
        assert!(repo.update(ghost).await.unwrap_err().is_not_found());
        assert!(repo.delete(9).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn scopes_filter_and_page() {
        let repo = MemoryRepository::<Note>::new();
        repo.create(note("a", vec![content("en", "x")])).await.unwrap();
        repo.create(note("b", vec![content("ar", "y")])).await.unwrap();
        repo.create(note("a", vec![content("ar", "z")])).await.unwrap();

        let by_author = repo
            .get_all(&[Scope::Where {
                column: "author".into(),
                value: json!("a"),
            }])
            .await
            .unwrap();
        assert_eq!(by_author.iter().map(|n| n.model.id).collect::<Vec<_>>(), [1, 3]);

        let arabic = repo
            .get_all(&[Scope::ContentWhere {
                column: "language_id".into(),
                value: json!("ar"),
            }])
            .await
            .unwrap();
        assert_eq!(arabic.iter().map(|n| n.model.id).collect::<Vec<_>>(), [2, 3]);

        let page = repo.get_all(&[Scope::Offset(1), Scope::Limit(1)]).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].model.id, 2);
    }

    #[tokio::test]
    async fn limit_is_clamped_like_the_sql_backend() {
        let repo = MemoryRepository::<Note>::new();
        for _ in 0..=MAX_LIMIT {
            repo.create(note("a", Vec::new())).await.unwrap();
        }
        let page = repo.get_all(&[Scope::Limit(5000)]).await.unwrap();
        assert_eq!(page.len(), MAX_LIMIT as usize);
        assert_eq!(repo.get_all(&[]).await.unwrap().len(), MAX_LIMIT as usize + 1);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let repo = MemoryRepository::<Note>::new();
        let created = repo.create(note("a", Vec::new())).await.unwrap();
        repo.delete(created.model.id).await.unwrap();
        assert!(repo.get_all(&[]).await.unwrap().is_empty());
        assert!(repo.has_contents());
    }
}
