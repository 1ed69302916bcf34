//! Model CRUD routes: `/<snake_case_type_name>` and `/<snake_case_type_name>/:id`.

use crate::handlers::model::{create, delete, get_by_id, list, update};
use crate::schema::Entity;
use crate::service::ModelService;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

pub fn model_routes<T: Entity>(service: ModelService<T>) -> Router {
    let segment = T::schema().path_segment();
    Router::new()
        .route(&format!("/{segment}"), get(list::<T>).post(create::<T>))
        .route(
            &format!("/{segment}/:id"),
            get(get_by_id::<T>).patch(update::<T>).delete(delete::<T>),
        )
        .with_state(service)
}

/// Nests every model router under `/api`; request bodies are capped at
/// `body_limit_bytes`.
pub fn api_router(models: impl IntoIterator<Item = Router>, body_limit_bytes: usize) -> Router {
    let api = models
        .into_iter()
        .fold(Router::new(), |api, model| api.merge(model));
    Router::new()
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(body_limit_bytes)))
}
