//! Lingua CRUD: REST scaffolding for multilingual content models.
//!
//! A model embeds [`Model`] and may own a `Vec` of content records (each
//! embedding [`ContentModel`]) keyed by language. `#[derive(Entity)]`
//! describes the struct at compile time; the engine derives create, update
//! and filter shapes from that description, and [`model_routes`] serves
//! list/get/create/patch/delete over a [`Repository`].

extern crate self as lingua_crud;

pub mod case;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod orm;
pub mod repository;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod settings;
pub mod sql;
pub mod store;

pub use engine::{Engine, Params, Shape, ShapeKind};
pub use error::{ApiError, AppError, ConfigError, CopyError, EngineError, ErrorCode, ParseError, ShapeError};
pub use lingua_crud_derive::Entity;
pub use migration::{auto_migrate, ensure_languages};
pub use orm::{extract_contents, is_content_contained, merge_contents, ContentModel, Language, Model};
pub use repository::{MemoryRepository, PgRepository, Repository, Scope};
pub use routes::{api_router, common_routes, model_routes};
pub use schema::{Entity, LanguageTagged, ModelSchema};
pub use service::ModelService;
pub use settings::Settings;
pub use store::{connect, ensure_database_exists};
