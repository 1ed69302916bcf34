//! Schema validation: catches model descriptions that cannot produce shapes.

use crate::error::ShapeError;
use crate::schema::{FieldType, ModelSchema, RecordType};
use std::collections::HashSet;

pub fn validate_schema(schema: &ModelSchema) -> Result<(), ShapeError> {
    validate_record(&schema.record)?;

    if let Some(contents) = &schema.contents {
        let field = schema
            .record
            .get(&contents.field)
            .ok_or_else(|| ShapeError::MissingField {
                record: schema.name().to_string(),
                field: contents.field.clone(),
            })?;
        let element = field.ty.list_record().ok_or_else(|| ShapeError::NotAList {
            record: schema.name().to_string(),
            field: field.name.clone(),
        })?;
        if !element.is_content() {
            return Err(ShapeError::NotContent {
                record: element.name.clone(),
            });
        }
        if contents.foreign_key.is_empty() {
            return Err(ShapeError::MissingForeignKey {
                record: element.name.clone(),
            });
        }
    }

    if schema.id_field().is_none() {
        return Err(ShapeError::MissingId {
            record: schema.name().to_string(),
        });
    }

    Ok(())
}

/// Names and keys must be unique; nested records are checked too.
pub fn validate_record(record: &RecordType) -> Result<(), ShapeError> {
    let mut names = HashSet::new();
    let mut keys = HashSet::new();
    for field in &record.fields {
        if !names.insert(field.name.as_str()) || !keys.insert(field.key.as_str()) {
            return Err(ShapeError::DuplicateField {
                record: record.name.clone(),
                field: field.name.clone(),
            });
        }
        if let Some(inner) = nested_record(&field.ty) {
            validate_record(inner)?;
        }
    }
    Ok(())
}

fn nested_record(ty: &FieldType) -> Option<&RecordType> {
    match ty.deref() {
        FieldType::Record(record) => Some(record),
        FieldType::List(inner) => nested_record(inner),
        _ => None,
    }
}
