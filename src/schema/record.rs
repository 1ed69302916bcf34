//! Traits implemented by `#[derive(Entity)]` and by the built-in base models.

use super::types::{FieldType, ModelSchema, RecordType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// A struct whose field list is known at compile time.
pub trait Record {
    fn record_type() -> Arc<RecordType>;
}

/// Maps a Rust type to its [`FieldType`].
pub trait FieldKind {
    fn field_type() -> FieldType;
}

/// A persisted model.
pub trait Entity:
    Record + Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    fn schema() -> &'static ModelSchema;
}

/// Content capability: a record keyed by a language identifier.
pub trait LanguageTagged {
    fn language_id(&self) -> &str;
}

macro_rules! field_kind {
    ($variant:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl FieldKind for $ty {
                fn field_type() -> FieldType {
                    FieldType::$variant
                }
            }
        )+
    };
}

field_kind!(Bool => bool);
field_kind!(Int => i8, i16, i32, i64, u8, u16, u32);
field_kind!(Float => f32, f64);
field_kind!(Text => String);
field_kind!(Timestamp => chrono::DateTime<chrono::Utc>, chrono::NaiveDateTime);
field_kind!(Uuid => uuid::Uuid);
field_kind!(Json => serde_json::Value);

impl<T: FieldKind> FieldKind for Option<T> {
    fn field_type() -> FieldType {
        FieldType::optional(T::field_type())
    }
}

impl<T: FieldKind> FieldKind for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_map_to_field_types() {
        assert_eq!(<i32 as FieldKind>::field_type(), FieldType::Int);
        assert_eq!(<String as FieldKind>::field_type(), FieldType::Text);
        assert_eq!(
            <Option<Vec<bool>> as FieldKind>::field_type(),
            FieldType::Optional(Box::new(FieldType::List(Box::new(FieldType::Bool))))
        );
    }
}
