//! Field and record descriptions produced by `#[derive(Entity)]`.

use crate::case::{to_snake_case, to_table_name};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Wire/storage type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
    Uuid,
    Json,
    Optional(Box<FieldType>),
    List(Box<FieldType>),
    Record(Arc<RecordType>),
}

impl FieldType {
    pub fn optional(inner: FieldType) -> Self {
        match inner {
            FieldType::Optional(_) => inner,
            other => FieldType::Optional(Box::new(other)),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldType::Optional(_))
    }

    /// Strips any `Optional` wrappers.
    pub fn deref(&self) -> &FieldType {
        let mut ty = self;
        while let FieldType::Optional(inner) = ty {
            ty = inner;
        }
        ty
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self.deref(), FieldType::List(_) | FieldType::Record(_))
    }

    /// Element record of a `List(Record(_))`, if that is what this is.
    pub fn list_record(&self) -> Option<&Arc<RecordType>> {
        match self.deref() {
            FieldType::List(inner) => match inner.deref() {
                FieldType::Record(record) => Some(record),
                _ => None,
            },
            _ => None,
        }
    }

    /// PostgreSQL type used for DDL and parameter casts.
    pub fn pg_type(&self) -> &'static str {
        match self.deref() {
            FieldType::Bool => "boolean",
            FieldType::Int => "bigint",
            FieldType::Float => "double precision",
            FieldType::Text => "text",
            FieldType::Timestamp => "timestamptz",
            FieldType::Uuid => "uuid",
            FieldType::Json | FieldType::List(_) | FieldType::Record(_) => "jsonb",
            FieldType::Optional(_) => unreachable!("deref strips Optional"),
        }
    }

    /// Value a freshly allocated field holds.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::Int => Value::from(0_i64),
            FieldType::Float => Value::from(0.0_f64),
            FieldType::Text => Value::String(String::new()),
            FieldType::Timestamp => Value::String("1970-01-01T00:00:00Z".into()),
            FieldType::Uuid => Value::String(uuid::Uuid::nil().to_string()),
            FieldType::Json | FieldType::Optional(_) => Value::Null,
            FieldType::List(_) => Value::Array(Vec::new()),
            FieldType::Record(record) => Value::Object(record.zero_value()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Bool => f.write_str("bool"),
            FieldType::Int => f.write_str("int"),
            FieldType::Float => f.write_str("float"),
            FieldType::Text => f.write_str("string"),
            FieldType::Timestamp => f.write_str("timestamp"),
            FieldType::Uuid => f.write_str("uuid"),
            FieldType::Json => f.write_str("json"),
            FieldType::Optional(inner) => write!(f, "Option<{inner}>"),
            FieldType::List(inner) => write!(f, "Vec<{inner}>"),
            FieldType::Record(record) => f.write_str(&record.name),
        }
    }
}

/// Fields contributed by the shared base embeddings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseField {
    Id,
    CreatedAt,
    UpdatedAt,
    LanguageId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    Regular,
    Base(BaseField),
}

/// Storage hints from `#[crud(sql_type = "...", default = "...", index)]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnOptions {
    pub sql_type: Option<String>,
    pub default: Option<String>,
    pub index: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Declared name; copies match on this.
    pub name: String,
    /// Key on the wire: JSON key, or query-string key in filter shapes.
    pub key: String,
    pub ty: FieldType,
    pub role: FieldRole,
    pub column: ColumnOptions,
    /// Validation hint carried into shapes. Not enforced.
    pub validate: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            ty,
            role: FieldRole::Regular,
            column: ColumnOptions::default(),
            validate: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_column(mut self, column: ColumnOptions) -> Self {
        self.column = column;
        self
    }

    pub fn with_validate(mut self, validate: Option<String>) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_type(mut self, ty: FieldType) -> Self {
        self.ty = ty;
        self
    }

    pub fn is_base(&self) -> bool {
        matches!(self.role, FieldRole::Base(_))
    }

    pub fn is_language(&self) -> bool {
        self.role == FieldRole::Base(BaseField::LanguageId)
    }

    /// Identifier-suffixed fields are treated as foreign keys.
    pub fn is_identifier(&self) -> bool {
        self.name.ends_with("_id") || self.name == "id"
    }

    /// Storage column type, honouring a `sql_type` override.
    pub fn sql_type(&self) -> &str {
        self.column.sql_type.as_deref().unwrap_or_else(|| self.ty.pg_type())
    }
}

/// A struct's field list.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<Field>,
    /// Key of the language identifier when the record is a content record.
    pub language_key: Option<String>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            language_key: None,
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        if field.is_language() && self.language_key.is_none() {
            self.language_key = Some(field.key.clone());
        }
        self.fields.push(field);
        self
    }

    /// Hoists an embedded record's fields into this one.
    pub fn flatten(mut self, inner: &RecordType) -> Self {
        for field in &inner.fields {
            self = self.field(field.clone());
        }
        if self.language_key.is_none() {
            self.language_key.clone_from(&inner.language_key);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn by_key(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn base(&self, base: BaseField) -> Option<&Field> {
        self.fields.iter().find(|f| f.role == FieldRole::Base(base))
    }

    /// Satisfies the content capability (exposes a language identifier).
    pub fn is_content(&self) -> bool {
        self.language_key.is_some()
    }

    pub fn zero_value(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.key.clone(), f.ty.zero_value()))
            .collect()
    }
}

/// The `contents` collection of a model.
#[derive(Clone, Debug)]
pub struct ContentsRelation {
    /// Declared name of the collection field on the parent.
    pub field: String,
    /// Column on the content table pointing at the parent's id.
    pub foreign_key: String,
    pub schema: &'static ModelSchema,
}

impl ContentsRelation {
    /// `C` must be a content entity; a non-content element fails to compile.
    pub fn of<C>(field: &str, foreign_key: Option<String>, parent_type: &str) -> Self
    where
        C: super::Entity + super::LanguageTagged,
    {
        Self {
            field: field.to_string(),
            foreign_key: foreign_key.unwrap_or_else(|| format!("{}_id", to_snake_case(parent_type))),
            schema: C::schema(),
        }
    }
}

/// Persistence view of a model: record + table + optional contents.
#[derive(Clone, Debug)]
pub struct ModelSchema {
    pub record: Arc<RecordType>,
    pub table: String,
    pub contents: Option<ContentsRelation>,
}

impl ModelSchema {
    pub fn new(record: Arc<RecordType>, table: Option<String>) -> Self {
        let table = table.unwrap_or_else(|| to_table_name(&record.name));
        Self {
            record,
            table,
            contents: None,
        }
    }

    pub fn with_contents(mut self, contents: ContentsRelation) -> Self {
        self.contents = Some(contents);
        self
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Route segment: the snake_case type name.
    pub fn path_segment(&self) -> String {
        to_snake_case(&self.record.name)
    }

    pub fn has_contents(&self) -> bool {
        self.contents.is_some()
    }

    /// Field holding the contents collection.
    pub fn contents_field(&self) -> Option<&Field> {
        self.contents.as_ref().and_then(|c| self.record.get(&c.field))
    }

    pub fn id_field(&self) -> Option<&Field> {
        self.record.base(BaseField::Id)
    }

    /// Fields stored as columns of this model's table, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Field> {
        let contents = self.contents.as_ref().map(|c| c.field.as_str());
        self.record
            .fields
            .iter()
            .filter(move |f| Some(f.name.as_str()) != contents)
    }

    /// Columns written by INSERT/UPDATE: everything the database does not fill itself.
    pub fn writable_columns(&self) -> impl Iterator<Item = &Field> {
        self.columns().filter(|f| {
            !matches!(
                f.role,
                FieldRole::Base(BaseField::Id | BaseField::CreatedAt | BaseField::UpdatedAt)
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_record() -> RecordType {
        RecordType::new("PageContent")
            .field(
                Field::new("language_id", FieldType::Text)
                    .with_role(FieldRole::Base(BaseField::LanguageId)),
            )
            .field(Field::new("body", FieldType::Text))
    }

    #[test]
    fn flatten_inherits_language_key() {
        let record = RecordType::new("Wrapper").flatten(&content_record());
        assert_eq!(record.language_key.as_deref(), Some("language_id"));
        assert!(record.is_content());
        assert_eq!(record.fields.len(), 2);
    }

    #[test]
    fn display_names_nested_types() {
        let ty = FieldType::List(Box::new(FieldType::Record(Arc::new(content_record()))));
        assert_eq!(ty.to_string(), "Vec<PageContent>");
        assert_eq!(FieldType::optional(FieldType::Int).to_string(), "Option<int>");
    }

    #[test]
    fn optional_does_not_double_wrap() {
        let once = FieldType::optional(FieldType::Text);
        assert_eq!(FieldType::optional(once.clone()), once);
        assert_eq!(once.deref(), &FieldType::Text);
    }

    #[test]
    fn zero_value_covers_every_field() {
        let zero = content_record().zero_value();
        assert_eq!(zero["language_id"], Value::String(String::new()));
        assert_eq!(zero["body"], Value::String(String::new()));
    }

    #[test]
    fn table_defaults_to_plural_snake_case() {
        let schema = ModelSchema::new(Arc::new(RecordType::new("BlogPost")), None);
        assert_eq!(schema.table, "blog_posts");
        assert_eq!(schema.path_segment(), "blog_post");
    }
}
