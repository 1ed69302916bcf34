//! DDL for the languages table, model tables and their content tables.
//! Idempotent: every statement is `IF NOT EXISTS`; existing tables are not altered.

use crate::error::AppError;
use crate::orm::Language;
use crate::schema::{BaseField, ContentsRelation, Field, FieldType, ModelSchema};
use crate::sql::quoted;
use sqlx::PgPool;

pub const LANGUAGES_TABLE: &str = "languages";

fn column_def(field: &Field) -> String {
    if field.role == crate::schema::FieldRole::Base(BaseField::Id) {
        return format!("{} BIGSERIAL PRIMARY KEY", quoted(&field.name));
    }
    let mut def = format!("{} {}", quoted(&field.name), field.sql_type());
    if !matches!(field.ty, FieldType::Optional(_)) {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &field.column.default {
        def.push_str(&format!(" DEFAULT {default}"));
    }
    def
}

fn index_sql(table: &str, field: &Field) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quoted(&format!("idx_{}_{}", table, field.name)),
        quoted(table),
        quoted(&field.name)
    )
}

pub fn languages_table_sql() -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {} (
    "id" varchar(2) PRIMARY KEY,
    "title" text NOT NULL,
    "created_at" timestamptz NOT NULL DEFAULT NOW(),
    "updated_at" timestamptz NOT NULL DEFAULT NOW()
)"#,
        quoted(LANGUAGES_TABLE)
    )
}

/// CREATE TABLE for a model plus its indexes. The contents collection has
/// no column of its own.
pub fn model_table_sql(schema: &ModelSchema) -> Vec<String> {
    let defs: Vec<String> = schema.columns().map(column_def).collect();
    let mut stmts = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quoted(&schema.table),
        defs.join(",\n    ")
    )];
    stmts.extend(
        schema
            .columns()
            .filter(|f| f.column.index)
            .map(|f| index_sql(&schema.table, f)),
    );
    stmts
}

/// CREATE TABLE for a content model: keyed by (parent, language), rows
/// follow the parent on update and delete.
pub fn content_table_sql(parent: &ModelSchema, contents: &ContentsRelation) -> Vec<String> {
    let content = contents.schema;
    let fk = quoted(&contents.foreign_key);
    let parent_id = parent
        .id_field()
        .map(|f| quoted(&f.name))
        .unwrap_or_else(|| quoted("id"));
    let language = content
        .record
        .base(BaseField::LanguageId)
        .map(|f| quoted(&f.name))
        .unwrap_or_else(|| quoted("language_id"));

    let mut defs: Vec<String> = content.columns().map(column_def).collect();
    if content.record.get(&contents.foreign_key).is_none() {
        defs.insert(0, format!("{fk} bigint NOT NULL"));
    }
    defs.push(format!("PRIMARY KEY ({fk}, {language})"));
    defs.push(format!(
        "FOREIGN KEY ({fk}) REFERENCES {}({parent_id}) ON UPDATE CASCADE ON DELETE CASCADE",
        quoted(&parent.table)
    ));
    defs.push(format!(
        "FOREIGN KEY ({language}) REFERENCES {}(\"id\")",
        quoted(LANGUAGES_TABLE)
    ));

    let mut stmts = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quoted(&content.table),
        defs.join(",\n    ")
    )];
    stmts.extend(
        content
            .columns()
            .filter(|f| f.column.index)
            .map(|f| index_sql(&content.table, f)),
    );
    stmts
}

/// Creates the languages table, then each model table followed by its
/// content table.
pub async fn auto_migrate(pool: &PgPool, schemas: &[&ModelSchema]) -> Result<(), AppError> {
    let mut stmts = vec![languages_table_sql()];
    for schema in schemas {
        stmts.extend(model_table_sql(schema));
        if let Some(contents) = &schema.contents {
            stmts.extend(content_table_sql(schema, contents));
        }
    }
    for sql in &stmts {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(sql).execute(pool).await?;
    }
    tracing::info!(tables = schemas.len(), "migration applied");
    Ok(())
}

/// Inserts missing languages; existing ids are left alone.
pub async fn ensure_languages(pool: &PgPool, languages: &[Language]) -> Result<(), AppError> {
    let sql = format!(
        "INSERT INTO {} (\"id\", \"title\") VALUES ($1, $2) ON CONFLICT (\"id\") DO NOTHING",
        quoted(LANGUAGES_TABLE)
    );
    for language in languages {
        sqlx::query(&sql)
            .bind(&language.id)
            .bind(&language.title)
            .execute(pool)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{ContentModel, Model};
    use crate::schema::Entity;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, Serialize, Deserialize, crate::Entity)]
    struct Page {
        #[serde(flatten)]
        #[crud(base)]
        model: Model,
        #[crud(contents(foreign_key = "page_ref"))]
        contents: Vec<PageContent>,
        #[crud(default = "false", index)]
        hidden: bool,
        subtitle: Option<String>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize, crate::Entity)]
    struct PageContent {
        #[serde(flatten)]
        #[crud(content_base)]
        content_model: ContentModel,
        body: String,
    }

    #[test]
    fn model_table_has_serial_id_and_defaults() {
        let stmts = model_table_sql(Page::schema());
        assert_eq!(stmts.len(), 2);
        let table = &stmts[0];
        assert!(table.starts_with("CREATE TABLE IF NOT EXISTS \"pages\""));
        assert!(table.contains("\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(table.contains("\"created_at\" timestamptz NOT NULL DEFAULT NOW()"));
        assert!(table.contains("\"hidden\" boolean NOT NULL DEFAULT false"));
        assert!(table.contains("\"subtitle\" text"));
        assert!(!table.contains("\"subtitle\" text NOT NULL"));
        assert!(!table.contains("contents"));
        assert_eq!(
            stmts[1],
            "CREATE INDEX IF NOT EXISTS \"idx_pages_hidden\" ON \"pages\" (\"hidden\")"
        );
    }

    #[test]
    fn content_table_keys_on_parent_and_language() {
        let schema = Page::schema();
        let stmts = content_table_sql(schema, schema.contents.as_ref().unwrap());
        let table = &stmts[0];
        assert!(table.starts_with("CREATE TABLE IF NOT EXISTS \"page_contents\""));
        assert!(table.contains("\"page_ref\" bigint NOT NULL"));
        assert!(table.contains("\"language_id\" varchar(2) NOT NULL"));
        assert!(table.contains("PRIMARY KEY (\"page_ref\", \"language_id\")"));
        assert!(table.contains(
            "FOREIGN KEY (\"page_ref\") REFERENCES \"pages\"(\"id\") ON UPDATE CASCADE ON DELETE CASCADE"
        ));
        assert!(table.contains("FOREIGN KEY (\"language_id\") REFERENCES \"languages\"(\"id\")"));
        assert_eq!(
            stmts[1],
            "CREATE INDEX IF NOT EXISTS \"idx_page_contents_language_id\" ON \"page_contents\" (\"language_id\")"
        );
    }
}
