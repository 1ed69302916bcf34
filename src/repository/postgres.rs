//! PostgreSQL repository. One transaction per call; every failure rolls
//! back before it is returned.

use super::{content_rows, from_record, record_id, to_record, Repository, Scope};
use crate::error::AppError;
use crate::schema::{Entity, ModelSchema};
use crate::sql::{delete, insert, select_by_id, select_list, update, upsert_content, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Row, Transaction};
use std::marker::PhantomData;

pub struct PgRepository<T> {
    pool: PgPool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PgRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PgRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }
}

fn bind(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

async fn fetch_records(conn: &mut PgConnection, q: &QueryBuf) -> Result<Vec<Map<String, Value>>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind(q).fetch_all(&mut *conn).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match row.try_get::<Value, _>("record")? {
            Value::Object(map) => out.push(map),
            other => {
                return Err(AppError::Decode(serde::de::Error::custom(format!(
                    "expected a JSON object row, got {other}"
                ))))
            }
        }
    }
    Ok(out)
}

async fn fetch_id(conn: &mut PgConnection, q: &QueryBuf) -> Result<Option<i64>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind(q).fetch_optional(&mut *conn).await?;
    Ok(row.map(|r| r.try_get::<i64, _>(0)).transpose()?)
}

async fn execute(conn: &mut PgConnection, q: &QueryBuf) -> Result<u64, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    Ok(bind(q).execute(&mut *conn).await?.rows_affected())
}

/// Commits on success. On failure rolls back and returns the cause, or
/// [`AppError::Rollback`] carrying both errors when the rollback fails too.
async fn finish<R>(tx: Transaction<'static, Postgres>, result: Result<R, AppError>) -> Result<R, AppError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(cause) => match tx.rollback().await {
            Ok(()) => Err(cause),
            Err(rollback) => {
                tracing::error!(error = %cause, rollback_error = %rollback, "rollback failed");
                Err(AppError::Rollback {
                    cause: Box::new(cause),
                    rollback,
                })
            }
        },
    }
}

fn traced<R>(operation: &'static str, schema: &ModelSchema, result: Result<R, AppError>) -> Result<R, AppError> {
    match &result {
        Err(err) if err.is_not_found() => {
            tracing::info!(operation, model = schema.name(), error = %err, "repository operation found no row");
        }
        Err(err) => {
            tracing::error!(operation, model = schema.name(), error = %err, "repository operation failed");
        }
        Ok(_) => {}
    }
    result
}

async fn load(conn: &mut PgConnection, schema: &ModelSchema, id: i64) -> Result<Map<String, Value>, AppError> {
    fetch_records(conn, &select_by_id(schema, id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("{} {id}", schema.name())))
}

/// Upserts every content row of `record` under `parent_id`.
async fn save_contents(
    conn: &mut PgConnection,
    schema: &ModelSchema,
    parent_id: i64,
    record: &Map<String, Value>,
) -> Result<(), AppError> {
    let Some(contents) = &schema.contents else {
        return Ok(());
    };
    for row in content_rows(schema, record) {
        execute(conn, &upsert_content(contents, parent_id, &row)).await?;
    }
    Ok(())
}

async fn create_in(
    conn: &mut PgConnection,
    schema: &ModelSchema,
    record: &Map<String, Value>,
) -> Result<Map<String, Value>, AppError> {
    let id = fetch_id(conn, &insert(schema, record))
        .await?
        .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
    save_contents(conn, schema, id, record).await?;
    load(conn, schema, id).await
}

async fn update_in(
    conn: &mut PgConnection,
    schema: &ModelSchema,
    id: i64,
    record: &Map<String, Value>,
) -> Result<Map<String, Value>, AppError> {
    fetch_id(conn, &update(schema, id, record))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {id}", schema.name())))?;
    save_contents(conn, schema, id, record).await?;
    load(conn, schema, id).await
}

async fn delete_in(conn: &mut PgConnection, schema: &ModelSchema, id: i64) -> Result<(), AppError> {
    load(conn, schema, id).await?;
    fetch_id(conn, &delete(schema, id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {id}", schema.name())))?;
    Ok(())
}

#[async_trait]
impl<T: Entity> Repository<T> for PgRepository<T> {
    async fn get_by_id(&self, id: i64) -> Result<T, AppError> {
        let schema = T::schema();
        tracing::info!(operation = "get_by_id", model = schema.name(), model_id = id, "repository operation");
        let mut tx = self.pool.begin().await?;
        let result = load(&mut tx, schema, id).await;
        let record = traced("get_by_id", schema, finish(tx, result).await)?;
        from_record(record)
    }

    async fn get_all(&self, scopes: &[Scope]) -> Result<Vec<T>, AppError> {
        let schema = T::schema();
        tracing::info!(operation = "get_all", model = schema.name(), scopes = scopes.len(), "repository operation");
        let mut tx = self.pool.begin().await?;
        let result = fetch_records(&mut tx, &select_list(schema, scopes)).await;
        let records = traced("get_all", schema, finish(tx, result).await)?;
        tracing::info!(operation = "get_all", model = schema.name(), count = records.len(), "repository operation done");
        records.into_iter().map(from_record).collect()
    }

    async fn create(&self, model: T) -> Result<T, AppError> {
        let schema = T::schema();
        tracing::info!(operation = "create", model = schema.name(), "repository operation");
        let record = to_record(&model)?;
        let mut tx = self.pool.begin().await?;
        let result = create_in(&mut tx, schema, &record).await;
        let stored = traced("create", schema, finish(tx, result).await)?;
        tracing::info!(
            operation = "create",
            model = schema.name(),
            model_id = record_id(schema, &stored),
            "repository operation done"
        );
        from_record(stored)
    }

    async fn update(&self, model: T) -> Result<T, AppError> {
        let schema = T::schema();
        let record = to_record(&model)?;
        let id = record_id(schema, &record);
        tracing::info!(operation = "update", model = schema.name(), model_id = id, "repository operation");
        let mut tx = self.pool.begin().await?;
        let result = update_in(&mut tx, schema, id, &record).await;
        let stored = traced("update", schema, finish(tx, result).await)?;
        tracing::info!(operation = "update", model = schema.name(), model_id = id, "repository operation done");
        from_record(stored)
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let schema = T::schema();
        tracing::info!(operation = "delete", model = schema.name(), model_id = id, "repository operation");
        let mut tx = self.pool.begin().await?;
        let result = delete_in(&mut tx, schema, id).await;
        traced("delete", schema, finish(tx, result).await)?;
        tracing::info!(operation = "delete", model = schema.name(), model_id = id, "repository operation done");
        Ok(())
    }
}
