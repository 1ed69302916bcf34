//! ModelService: binds an entity's engine to its repository.

mod model;
pub use model::ModelService;
