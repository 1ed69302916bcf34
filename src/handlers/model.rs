//! Generic CRUD handlers. Bodies are read as raw bytes so malformed JSON is
//! reported with the step's error code instead of an extractor rejection.

use crate::error::{ApiError, ErrorCode, ParseError, ResultExt};
use crate::response::{created, ok};
use crate::schema::Entity;
use crate::service::ModelService;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use std::collections::HashMap;

/// Ids are positive; anything else fails with the step's `code`.
fn parse_id(raw: &str, code: ErrorCode) -> Result<i64, ApiError> {
    let invalid = |reason: String| ParseError::InvalidValue {
        field: "id".into(),
        reason: format!("'{raw}': {reason}"),
    };
    let id = raw.parse::<i64>().map_err(|e| invalid(e.to_string())).code(code)?;
    if id < 1 {
        return Err(invalid("must be at least 1".into())).code(code);
    }
    Ok(id)
}

fn parse_body(body: &Bytes, code: ErrorCode) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(ParseError::from).code(code)
}

pub async fn list<T: Entity>(
    State(service): State<ModelService<T>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let models = service.list(&query).await?;
    Ok(ok(models))
}

pub async fn get_by_id<T: Entity>(
    State(service): State<ModelService<T>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, ErrorCode::CantReadId)?;
    let model = service.get(id).await?;
    Ok(ok(model))
}

pub async fn create<T: Entity>(
    State(service): State<ModelService<T>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_body(&body, ErrorCode::ParseCreateParamsError)?;
    let model = service.create(&body).await?;
    Ok(created(model))
}

pub async fn update<T: Entity>(
    State(service): State<ModelService<T>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, ErrorCode::NotFound)?;
    let model = service.update(id, &body).await?;
    Ok(ok(model))
}

pub async fn delete<T: Entity>(
    State(service): State<ModelService<T>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, ErrorCode::DeleteError)?;
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
