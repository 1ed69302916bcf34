pub mod record;
pub mod types;
pub mod validator;

pub use record::*;
pub use types::*;
pub use validator::*;
