//! Example blog service.
//!
//! Run from repo root: `cargo run -p example-blog`. With `DATABASE_URL` set the
//! tables are migrated and the `en`/`ar` languages seeded; without it the
//! models live in memory.

use lingua_crud::{
    api_router, auto_migrate, common_routes, connect, ensure_languages, ContentModel, Entity,
    Language, Model, ModelService, Settings,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

#[derive(Clone, Debug, Default, Serialize, Deserialize, Entity)]
pub struct Blog {
    #[serde(flatten)]
    #[crud(base)]
    pub model: Model,
    #[crud(contents(foreign_key = "blog_id"))]
    pub contents: Vec<BlogContent>,
    pub owner: String,
    #[crud(default = "false", index)]
    pub is_published: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Entity)]
pub struct BlogContent {
    #[serde(flatten)]
    #[crud(content_base)]
    pub content_model: ContentModel,
    pub content: String,
    pub blog_id: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    settings.init_tracing();

    let pool = connect(&settings).await?;
    if let Some(pool) = &pool {
        auto_migrate(pool, &[Blog::schema()]).await?;
        ensure_languages(pool, &[Language::new("en", "English"), Language::new("ar", "Arabic")]).await?;
    } else {
        tracing::warn!("DATABASE_URL not set; using in-memory storage");
    }

    let blogs = ModelService::<Blog>::from_pool(pool.clone());
    let app = api_router([lingua_crud::model_routes(blogs)], settings.body_limit_bytes)
        .merge(common_routes(pool));

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "example blog listening");
    axum::serve(listener, app).await?;
    Ok(())
}
