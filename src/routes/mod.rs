//! Router assembly: per-model CRUD routes under `/api`, plus common routes.

pub mod common;
pub mod model;

pub use common::common_routes;
pub use model::{api_router, model_routes};
