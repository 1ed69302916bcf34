use crate::engine::Engine;
use crate::error::{ApiError, ErrorCode, ParseError, ResultExt};
use crate::repository::{MemoryRepository, PgRepository, Repository};
use crate::schema::Entity;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

/// Runs one request's worth of work for `T`. Each step failure is tagged
/// with the error code the HTTP layer reports.
pub struct ModelService<T> {
    engine: Engine<T>,
    repository: Arc<dyn Repository<T>>,
}

impl<T> Clone for ModelService<T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<T: Entity> ModelService<T> {
    pub fn new(repository: Arc<dyn Repository<T>>) -> Self {
        Self {
            engine: Engine::new(),
            repository,
        }
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryRepository::<T>::new()))
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgRepository::<T>::new(pool)))
    }

    /// PostgreSQL when a pool is given, in-memory otherwise.
    pub fn from_pool(pool: Option<PgPool>) -> Self {
        match pool {
            Some(pool) => Self::postgres(pool),
            None => Self::memory(),
        }
    }

    pub fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    pub fn repository(&self) -> &Arc<dyn Repository<T>> {
        &self.repository
    }

    pub async fn list(&self, query: &HashMap<String, String>) -> Result<Vec<T>, ApiError> {
        let shape = self
            .engine
            .filter_shape()
            .code(ErrorCode::GenerateFilterParamsError)?;
        let scopes = self
            .engine
            .parse_filter(&shape, query)
            .code(ErrorCode::ParseFilterParamsError)?;
        self.repository
            .get_all(&scopes)
            .await
            .code(ErrorCode::FetchError)
    }

    pub async fn get(&self, id: i64) -> Result<T, ApiError> {
        self.repository
            .get_by_id(id)
            .await
            .code(ErrorCode::FetchReadObjectError)
    }

    pub async fn create(&self, body: &Value) -> Result<T, ApiError> {
        let shape = self
            .engine
            .create_shape()
            .code(ErrorCode::GenerateCreateParamsError)?;
        let params = self
            .engine
            .parse_params(&shape, body)
            .code(ErrorCode::ParseCreateParamsError)?;
        let model = self
            .engine
            .build_from_create_params(&params)
            .code(ErrorCode::GenerateCreateModelError)?;
        self.repository
            .create(model)
            .await
            .code(ErrorCode::CreateError)
    }

    /// Partial update: the stored model is fetched first, then the raw JSON
    /// body is parsed against the update shape, applied and saved.
    pub async fn update(&self, id: i64, body: &[u8]) -> Result<T, ApiError> {
        let current = self
            .repository
            .get_by_id(id)
            .await
            .code(ErrorCode::NotFound)?;
        let shape = self
            .engine
            .update_shape()
            .code(ErrorCode::GenerateUpdateParamsError)?;
        let body: Value = serde_json::from_slice(body)
            .map_err(ParseError::from)
            .code(ErrorCode::ParseUpdateParamsError)?;
        let params = self
            .engine
            .parse_params(&shape, &body)
            .code(ErrorCode::ParseUpdateParamsError)?;
        let model = self
            .engine
            .apply_update_params(current, &params)
            .code(ErrorCode::GenerateUpdateModelError)?;
        self.repository
            .update(model)
            .await
            .code(ErrorCode::UpdateError)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.repository
            .delete(id)
            .await
            .code(ErrorCode::DeleteError)
    }
}
