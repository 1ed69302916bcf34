//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and content upserts
//! from a [`ModelSchema`]. Identifiers come from schemas only; values are
//! always parameters.

use super::params::PgBindValue;
use crate::repository::{Scope, MAX_LIMIT};
use crate::schema::{BaseField, ContentsRelation, Field, ModelSchema};
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "main";
const SUB_ALIAS: &str = "sub";

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }

    /// Pushes the record's value for `field` and returns its cast placeholder.
    fn push_field(&mut self, field: &Field, record: &Map<String, Value>) -> String {
        let value = record.get(&field.key).unwrap_or(&Value::Null);
        self.push_value(field, value)
    }

    fn push_value(&mut self, field: &Field, value: &Value) -> String {
        let n = self.push_param(PgBindValue::for_field(&field.ty, value));
        format!("${}::{}", n, field.sql_type())
    }
}

/// `json_build_object('key', alias."column", ...)` over `fields`.
fn json_object<'a>(alias: &str, fields: impl Iterator<Item = &'a Field>) -> String {
    let pairs: Vec<String> = fields
        .map(|f| format!("'{}', {}.{}", f.key.replace('\'', "''"), alias, quoted(&f.name)))
        .collect();
    format!("json_build_object({})", pairs.join(", "))
}

/// Scalar subquery aggregating the content rows of `main` as a JSON array.
fn contents_subquery(contents: &ContentsRelation, parent_key: &str) -> String {
    let content = contents.schema;
    let object = json_object(SUB_ALIAS, content.columns());
    let mut order = Vec::new();
    if let Some(created) = content.record.base(BaseField::CreatedAt) {
        order.push(format!("{}.{}", SUB_ALIAS, quoted(&created.name)));
    }
    if let Some(language) = content.record.base(BaseField::LanguageId) {
        order.push(format!("{}.{}", SUB_ALIAS, quoted(&language.name)));
    }
    let order_clause = if order.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order.join(", "))
    };
    format!(
        "(SELECT COALESCE(json_agg({object}{order_clause}), '[]'::json) FROM {} {SUB_ALIAS} WHERE {SUB_ALIAS}.{} = {MAIN_ALIAS}.{})",
        quoted(&content.table),
        quoted(&contents.foreign_key),
        quoted(parent_key),
    )
}

/// SELECT head producing one JSON column named `record` per model, contents
/// eager-loaded into the collection field.
fn select_records(schema: &ModelSchema) -> String {
    let mut pairs: Vec<String> = schema
        .columns()
        .map(|f| format!("'{}', {}.{}", f.key.replace('\'', "''"), MAIN_ALIAS, quoted(&f.name)))
        .collect();
    if let (Some(contents), Some(field), Some(id)) =
        (&schema.contents, schema.contents_field(), schema.id_field())
    {
        pairs.push(format!(
            "'{}', {}",
            field.key.replace('\'', "''"),
            contents_subquery(contents, &id.name)
        ));
    }
    format!(
        "SELECT json_build_object({}) AS record FROM {} {MAIN_ALIAS}",
        pairs.join(", "),
        quoted(&schema.table)
    )
}

fn id_column(schema: &ModelSchema) -> String {
    schema
        .id_field()
        .map(|f| quoted(&f.name))
        .unwrap_or_else(|| quoted("id"))
}

/// SELECT one model by id. Caller binds nothing else.
pub fn select_by_id(schema: &ModelSchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "{} WHERE {MAIN_ALIAS}.{} = ${n}",
        select_records(schema),
        id_column(schema)
    );
    q
}

/// SELECT list with scopes applied, ordered by id. `Where` compares a parent
/// column; `ContentWhere` requires a matching content row.
pub fn select_list(schema: &ModelSchema, scopes: &[Scope]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id = id_column(schema);
    let mut where_parts = Vec::new();
    let mut limit = None;
    let mut offset = None;

    for scope in scopes {
        match scope {
            Scope::Where { column, value } => {
                let Some(field) = schema.columns().find(|f| f.name == *column) else {
                    continue;
                };
                let ph = q.push_value(field, value);
                where_parts.push(format!("{MAIN_ALIAS}.{} = {ph}", quoted(column)));
            }
            Scope::ContentWhere { column, value } => {
                let Some(contents) = &schema.contents else {
                    continue;
                };
                let Some(field) = contents.schema.columns().find(|f| f.name == *column) else {
                    continue;
                };
                let ph = q.push_value(field, value);
                where_parts.push(format!(
                    "EXISTS (SELECT 1 FROM {} c WHERE c.{} = {MAIN_ALIAS}.{id} AND c.{} = {ph})",
                    quoted(&contents.schema.table),
                    quoted(&contents.foreign_key),
                    quoted(column),
                ));
            }
            Scope::Limit(n) => limit = Some((*n).min(MAX_LIMIT)),
            Scope::Offset(n) => offset = Some(*n),
        }
    }

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let limit_clause = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {n}")).unwrap_or_default();
    q.sql = format!(
        "{}{where_clause} ORDER BY {MAIN_ALIAS}.{id}{limit_clause}{offset_clause}",
        select_records(schema)
    );
    q
}

/// INSERT of the parent row's writable columns. Returns the new id.
pub fn insert(schema: &ModelSchema, record: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for field in schema.writable_columns() {
        placeholders.push(q.push_field(field, record));
        cols.push(quoted(&field.name));
    }
    let table = quoted(&schema.table);
    let id = id_column(schema);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES RETURNING {id}")
    } else {
        format!(
            "INSERT INTO {table} ({}) VALUES ({}) RETURNING {id}",
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

/// Full UPDATE of the parent row's writable columns; `updated_at` is set by
/// the database. Returns the id, or no row when absent.
pub fn update(schema: &ModelSchema, id: i64, record: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for field in schema.writable_columns() {
        let ph = q.push_field(field, record);
        sets.push(format!("{} = {ph}", quoted(&field.name)));
    }
    if let Some(updated) = schema.record.base(BaseField::UpdatedAt) {
        sets.push(format!("{} = NOW()", quoted(&updated.name)));
    }
    let id_col = id_column(schema);
    if sets.is_empty() {
        sets.push(format!("{id_col} = {id_col}"));
    }
    let n = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {id_col} = ${n} RETURNING {id_col}",
        quoted(&schema.table),
        sets.join(", ")
    );
    q
}

/// INSERT ... ON CONFLICT (fk, language) DO UPDATE for one content row.
/// The foreign key is always `parent_id`, whatever the row carries.
pub fn upsert_content(contents: &ContentsRelation, parent_id: i64, row: &Map<String, Value>) -> QueryBuf {
    let content = contents.schema;
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::I64(parent_id));
    let fk = quoted(&contents.foreign_key);
    let mut cols = vec![fk.clone()];
    let mut placeholders = vec![format!("${n}::bigint")];
    let mut updates = Vec::new();

    let language = content.record.base(BaseField::LanguageId);
    for field in content.writable_columns() {
        if field.name == contents.foreign_key {
            continue;
        }
        placeholders.push(q.push_field(field, row));
        let col = quoted(&field.name);
        if Some(field) != language {
            updates.push(format!("{col} = EXCLUDED.{col}"));
        }
        cols.push(col);
    }
    if let Some(updated) = content.record.base(BaseField::UpdatedAt) {
        updates.push(format!("{} = NOW()", quoted(&updated.name)));
    }

    let language_col = language
        .map(|f| quoted(&f.name))
        .unwrap_or_else(|| quoted("language_id"));
    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({fk}, {language_col}) {on_conflict}",
        quoted(&content.table),
        cols.join(", "),
        placeholders.join(", "),
    );
    q
}

/// DELETE by id. Content rows go with it through ON DELETE CASCADE.
pub fn delete(schema: &ModelSchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::I64(id));
    let id_col = id_column(schema);
    q.sql = format!(
        "DELETE FROM {} WHERE {id_col} = ${n} RETURNING {id_col}",
        quoted(&schema.table)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{ContentModel, Model};
    use crate::schema::Entity;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Clone, Debug, Default, Serialize, Deserialize, crate::Entity)]
    struct Article {
        #[serde(flatten)]
        #[crud(base)]
        model: Model,
        #[crud(contents)]
        contents: Vec<ArticleContent>,
        #[serde(rename = "isPublished")]
        #[crud(default = "false", index)]
        is_published: bool,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize, crate::Entity)]
    struct ArticleContent {
        #[serde(flatten)]
        #[crud(content_base)]
        content_model: ContentModel,
        title: String,
        article_id: i64,
    }

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn select_by_id_eager_loads_contents() {
        let q = select_by_id(Article::schema(), 7);
        assert!(q.sql.starts_with("SELECT json_build_object('id', main.\"id\""));
        assert!(q.sql.contains("'isPublished', main.\"is_published\""));
        assert!(q.sql.contains("'contents', (SELECT COALESCE(json_agg("));
        assert!(q.sql.contains("FROM \"article_contents\" sub WHERE sub.\"article_id\" = main.\"id\""));
        assert!(q.sql.ends_with("WHERE main.\"id\" = $1"));
        assert_eq!(q.params, vec![PgBindValue::I64(7)]);
    }

    #[test]
    fn select_list_applies_scopes_in_order() {
        let q = select_list(
            Article::schema(),
            &[
                Scope::Where {
                    column: "is_published".into(),
                    value: json!(true),
                },
                Scope::ContentWhere {
                    column: "language_id".into(),
                    value: json!("en"),
                },
                Scope::Limit(5000),
                Scope::Offset(10),
            ],
        );
        assert!(q.sql.contains("WHERE main.\"is_published\" = $1::boolean AND EXISTS (SELECT 1 FROM \"article_contents\" c WHERE c.\"article_id\" = main.\"id\" AND c.\"language_id\" = $2::varchar(2))"));
        assert!(q.sql.ends_with("ORDER BY main.\"id\" LIMIT 1000 OFFSET 10"));
        assert_eq!(
            q.params,
            vec![PgBindValue::Bool(true), PgBindValue::String("en".into())]
        );
    }

    #[test]
    fn unknown_scope_columns_are_ignored() {
        let q = select_list(
            Article::schema(),
            &[Scope::Where {
                column: "nope".into(),
                value: json!(1),
            }],
        );
        assert!(!q.sql.contains("nope"));
        assert!(q.sql.ends_with("FROM \"articles\" main ORDER BY main.\"id\""));
        assert!(q.params.is_empty());
    }

    #[test]
    fn insert_skips_database_managed_columns() {
        let q = insert(
            Article::schema(),
            &record(json!({"id": 3, "isPublished": true, "created_at": "x"})),
        );
        assert_eq!(
            q.sql,
            "INSERT INTO \"articles\" (\"is_published\") VALUES ($1::boolean) RETURNING \"id\""
        );
        assert_eq!(q.params, vec![PgBindValue::Bool(true)]);
    }

    #[test]
    fn update_touches_updated_at() {
        let q = update(Article::schema(), 4, &record(json!({"isPublished": false})));
        assert_eq!(
            q.sql,
            "UPDATE \"articles\" SET \"is_published\" = $1::boolean, \"updated_at\" = NOW() WHERE \"id\" = $2 RETURNING \"id\""
        );
        assert_eq!(q.params, vec![PgBindValue::Bool(false), PgBindValue::I64(4)]);
    }

    #[test]
    fn upsert_content_conflicts_on_parent_and_language() {
        let contents = Article::schema().contents.as_ref().unwrap();
        let q = upsert_content(
            contents,
            9,
            &record(json!({"language_id": "ar", "title": "t", "article_id": 0})),
        );
        assert_eq!(
            q.sql,
            "INSERT INTO \"article_contents\" (\"article_id\", \"language_id\", \"title\") VALUES ($1::bigint, $2::varchar(2), $3::text) ON CONFLICT (\"article_id\", \"language_id\") DO UPDATE SET \"title\" = EXCLUDED.\"title\", \"updated_at\" = NOW()"
        );
        assert_eq!(
            q.params,
            vec![
                PgBindValue::I64(9),
                PgBindValue::String("ar".into()),
                PgBindValue::String("t".into()),
            ]
        );
    }

    #[test]
    fn delete_returns_the_id() {
        let q = delete(Article::schema(), 2);
        assert_eq!(q.sql, "DELETE FROM \"articles\" WHERE \"id\" = $1 RETURNING \"id\"");
    }
}
