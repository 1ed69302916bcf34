//! `#[derive(Entity)]`: describes a model's fields at compile time so the
//! runtime never has to reflect over struct layouts.
//!
//! ```rust,ignore
//! #[derive(Clone, Debug, Default, Serialize, Deserialize, Entity)]
//! #[crud(table = "blogs")]
//! pub struct Blog {
//!     #[serde(flatten)]
//!     #[crud(base)]
//!     pub model: Model,
//!     #[crud(contents(foreign_key = "blog_id"))]
//!     pub contents: Vec<BlogContent>,
//!     pub owner: String,
//!     #[crud(default = "false", index)]
//!     pub is_published: bool,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod entity;

#[proc_macro_derive(Entity, attributes(crud))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input.into()).into()
}
