//! Derives create, update and filter parameter shapes from a model's field list.

use crate::case::to_snake_case;
use crate::error::ShapeError;
use crate::schema::{validate_schema, Field, FieldType, ModelSchema, RecordType};
use std::collections::HashSet;
use std::sync::Arc;

/// Query key under which the content language is filtered.
pub const LANGUAGE_FILTER_KEY: &str = "language_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Create,
    Update,
    Filter,
}

impl ShapeKind {
    fn suffix(self) -> &'static str {
        match self {
            ShapeKind::Create => "CreateParams",
            ShapeKind::Update => "UpdateParams",
            ShapeKind::Filter => "FilterParams",
        }
    }
}

/// A derived field list for one direction of data transfer.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub record: RecordType,
}

impl Shape {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.record.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.record.get(name)
    }
}

pub fn create_shape(schema: &ModelSchema) -> Result<Shape, ShapeError> {
    validate_schema(schema)?;
    Ok(Shape {
        kind: ShapeKind::Create,
        record: params_record(&schema.record, ShapeKind::Create),
    })
}

pub fn update_shape(schema: &ModelSchema) -> Result<Shape, ShapeError> {
    validate_schema(schema)?;
    Ok(Shape {
        kind: ShapeKind::Update,
        record: params_record(&schema.record, ShapeKind::Update),
    })
}

/// Optional scalars of the model plus the hoisted fields of its contents
/// relation. Other lists and records are not filterable.
pub fn filter_shape(schema: &ModelSchema) -> Result<Shape, ShapeError> {
    validate_schema(schema)?;
    let model = &schema.record;
    let contents = schema.contents_field().map(|f| f.name.as_str());
    let mut added = HashSet::new();
    let mut record = RecordType::new(format!("{}{}", model.name, ShapeKind::Filter.suffix()));

    for field in &model.fields {
        if field.is_base() {
            continue;
        }

        if let Some(inner) = field.ty.list_record() {
            // Only the contents relation is stored as rows; other lists are jsonb.
            if Some(field.name.as_str()) == contents {
                for inner_field in &inner.fields {
                    if inner_field.is_language() {
                        if added.insert(inner_field.name.clone()) {
                            record = record.field(
                                filter_field(inner_field).with_key(LANGUAGE_FILTER_KEY),
                            );
                        }
                        continue;
                    }
                    if inner_field.is_base() || inner_field.is_identifier() {
                        continue;
                    }
                    if added.insert(inner_field.name.clone()) {
                        record = record.field(filter_field(inner_field));
                    }
                }
            }
            continue;
        }

        if !field.ty.is_scalar() {
            continue;
        }
        if added.insert(field.name.clone()) {
            record = record.field(filter_field(field));
        }
    }

    Ok(Shape {
        kind: ShapeKind::Filter,
        record,
    })
}

fn filter_field(field: &Field) -> Field {
    field
        .clone()
        .with_key(to_snake_case(&field.key))
        .with_type(FieldType::optional(field.ty.clone()))
}

/// Create/update field list. `added` is shared by every nested content
/// record of the shape: the first record to claim a name keeps it.
fn params_record(model: &RecordType, kind: ShapeKind) -> RecordType {
    let mut added = HashSet::new();
    let mut record = RecordType::new(format!("{}{}", model.name, kind.suffix()));

    for field in &model.fields {
        if field.is_base() {
            if field.is_language() && added.insert(field.name.clone()) {
                record = record.field(with_kind(field.clone(), kind));
            }
            continue;
        }

        let field = match field.ty.list_record() {
            Some(inner) => {
                let nested = nested_record(inner, &mut added, kind);
                field
                    .clone()
                    .with_type(FieldType::List(Box::new(FieldType::Record(Arc::new(nested)))))
            }
            None => field.clone(),
        };
        record = record.field(with_kind(field, kind));
    }

    record
}

fn with_kind(field: Field, kind: ShapeKind) -> Field {
    match kind {
        ShapeKind::Update => {
            let ty = FieldType::optional(field.ty.clone());
            field.with_type(ty)
        }
        _ => field,
    }
}

fn nested_record(inner: &RecordType, added: &mut HashSet<String>, kind: ShapeKind) -> RecordType {
    let mut record = RecordType::new(format!("{}{}", inner.name, kind.suffix()));
    for field in &inner.fields {
        if field.is_base() {
            if field.is_language() && added.insert(field.name.clone()) {
                record = record.field(field.clone());
            }
            continue;
        }
        if added.contains(&field.name) || field.is_identifier() {
            continue;
        }
        added.insert(field.name.clone());
        record = record.field(field.clone());
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{ContentModel, Model};
    use crate::schema::{ContentsRelation, Record, RecordType};

    fn content(name: &str, extra: &[(&str, FieldType)]) -> Arc<RecordType> {
        let mut record = RecordType::new(name).flatten(&ContentModel::record_type());
        for (field, ty) in extra {
            record = record.field(Field::new(*field, ty.clone()));
        }
        Arc::new(record)
    }

    fn contents_type(record: Arc<RecordType>) -> FieldType {
        FieldType::List(Box::new(FieldType::Record(record)))
    }

    fn relation(field: &str, foreign_key: &str, content: Arc<RecordType>) -> ContentsRelation {
        ContentsRelation {
            field: field.into(),
            foreign_key: foreign_key.into(),
            schema: Box::leak(Box::new(ModelSchema::new(content, None))),
        }
    }

    fn blog_schema() -> ModelSchema {
        let blog_content = content(
            "BlogContent",
            &[("content", FieldType::Text), ("blog_id", FieldType::Int)],
        );
        let record = RecordType::new("Blog")
            .flatten(&Model::record_type())
            .field(Field::new("contents", contents_type(blog_content.clone())))
            .field(Field::new("owner", FieldType::Text).with_key("owner"))
            .field(Field::new("is_published", FieldType::Bool).with_key("isPublished"));
        ModelSchema::new(Arc::new(record), None).with_contents(relation("contents", "blog_id", blog_content))
    }

    fn names(shape: &Shape) -> Vec<&str> {
        shape.fields().iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn create_shape_excludes_identity_and_timestamps() {
        let shape = create_shape(&blog_schema()).unwrap();
        assert_eq!(names(&shape), ["contents", "owner", "is_published"]);
        assert!(shape.fields().iter().all(|f| !f.is_base()));
        assert_eq!(shape.name(), "BlogCreateParams");
    }

    #[test]
    fn create_shape_expands_nested_contents() {
        let shape = create_shape(&blog_schema()).unwrap();
        let contents = shape.field("contents").unwrap();
        let nested = contents.ty.list_record().unwrap();
        let nested_names: Vec<_> = nested.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(nested_names, ["language_id", "content"]);
        assert!(nested.is_content());
        assert_eq!(nested.name, "BlogContentCreateParams");
    }

    #[test]
    fn update_shape_makes_every_field_optional() {
        let shape = update_shape(&blog_schema()).unwrap();
        assert_eq!(names(&shape), ["contents", "owner", "is_published"]);
        assert!(shape.fields().iter().all(|f| f.ty.is_optional()));
        assert_eq!(shape.kind, ShapeKind::Update);
    }

    #[test]
    fn filter_shape_flattens_content_fields() {
        let shape = filter_shape(&blog_schema()).unwrap();
        assert_eq!(names(&shape), ["language_id", "content", "owner", "is_published"]);
        assert!(shape.fields().iter().all(|f| f.ty.is_optional()));
        assert_eq!(shape.field("is_published").unwrap().key, "is_published");
        assert_eq!(shape.field("language_id").unwrap().key, LANGUAGE_FILTER_KEY);
        assert!(shape.field("blog_id").is_none());
    }

    #[test]
    fn nested_names_are_keep_first_across_collections() {
        let first = content("TitleContent", &[("title", FieldType::Text)]);
        let second = content("SummaryContent", &[("title", FieldType::Int), ("summary", FieldType::Text)]);
        let record = RecordType::new("Page")
            .flatten(&Model::record_type())
            .field(Field::new("titles", contents_type(first.clone())))
            .field(Field::new("summaries", contents_type(second)));
        let schema = ModelSchema::new(Arc::new(record), None).with_contents(relation("titles", "page_id", first));

        let shape = create_shape(&schema).unwrap();
        let second_nested = shape.field("summaries").unwrap().ty.list_record().unwrap();
        let nested_names: Vec<_> = second_nested.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(nested_names, ["summary"]);

        let filter = filter_shape(&schema).unwrap();
        assert_eq!(filter.field("title").unwrap().ty, FieldType::optional(FieldType::Text));
        assert_eq!(names(&filter), ["language_id", "title"]);
    }

    #[test]
    fn filter_shape_hoists_only_the_contents_relation() {
        let body = content("PageContent", &[("body", FieldType::Text)]);
        let tags = content("TagContent", &[("label", FieldType::Text)]);
        let record = RecordType::new("Page")
            .flatten(&Model::record_type())
            .field(Field::new("contents", contents_type(body.clone())))
            .field(Field::new("tags", contents_type(tags)))
            .field(Field::new("owner", FieldType::Text));
        let schema = ModelSchema::new(Arc::new(record), None).with_contents(relation("contents", "page_id", body));

        let filter = filter_shape(&schema).unwrap();
        assert_eq!(names(&filter), ["language_id", "body", "owner"]);
        assert!(filter.field("label").is_none());

        // Without a relation no list is stored as rows, so nothing is hoisted.
        let plain = ModelSchema::new(schema.record.clone(), None);
        assert_eq!(names(&filter_shape(&plain).unwrap()), ["owner"]);
    }

    #[test]
    fn malformed_schema_fails_generation() {
        let record = RecordType::new("Broken").field(Field::new("label", FieldType::Text));
        let schema = ModelSchema::new(Arc::new(record), None);
        assert!(create_shape(&schema).is_err());
        assert!(update_shape(&schema).is_err());
        assert!(filter_shape(&schema).is_err());
    }
}
