//! Name-matched copy between two JSON records described by [`RecordType`]s.
//!
//! Fields are paired by declared name. Absent and null sources leave the
//! destination untouched. Optional wrappers are unwrapped or added as the
//! destination needs; nested records and lists are copied element-wise.

use crate::error::CopyError;
use crate::schema::{Field, FieldType, RecordType};
use serde_json::{Map, Value};

/// Copies every field of `src` that `dst_type` also declares.
/// On error `dst` is left as it was.
pub fn copy(
    dst: &mut Map<String, Value>,
    dst_type: &RecordType,
    src: &Map<String, Value>,
    src_type: &RecordType,
) -> Result<(), CopyError> {
    copy_at(dst, dst_type, src, src_type, "")
}

/// Like [`copy`], reporting errors under `path`.
pub fn copy_at(
    dst: &mut Map<String, Value>,
    dst_type: &RecordType,
    src: &Map<String, Value>,
    src_type: &RecordType,
    path: &str,
) -> Result<(), CopyError> {
    let mut staged = dst.clone();
    copy_fields(&mut staged, dst_type, src, src_type, path)?;
    *dst = staged;
    Ok(())
}

/// Copies a single source value into `dst_field`'s slot.
pub fn copy_field(
    dst: &mut Map<String, Value>,
    dst_field: &Field,
    src_field: &Field,
    value: &Value,
    path: &str,
) -> Result<(), CopyError> {
    if value.is_null() {
        return Ok(());
    }
    let field_path = join(path, &src_field.name);
    let current = dst.get(&dst_field.key);
    let converted = convert(value, &src_field.ty, &dst_field.ty, current, &field_path)?;
    dst.insert(dst_field.key.clone(), converted);
    Ok(())
}

fn copy_fields(
    dst: &mut Map<String, Value>,
    dst_type: &RecordType,
    src: &Map<String, Value>,
    src_type: &RecordType,
    path: &str,
) -> Result<(), CopyError> {
    for src_field in &src_type.fields {
        let Some(dst_field) = dst_type.get(&src_field.name) else {
            continue;
        };
        let Some(value) = src.get(&src_field.key) else {
            continue;
        };
        copy_field(dst, dst_field, src_field, value, path)?;
    }
    Ok(())
}

fn convert(
    value: &Value,
    from: &FieldType,
    to: &FieldType,
    current: Option<&Value>,
    path: &str,
) -> Result<Value, CopyError> {
    let (from, to) = (from.deref(), to.deref());
    if value.is_null() {
        return Ok(Value::Null);
    }

    match (from, to) {
        (FieldType::Record(src_type), FieldType::Record(dst_type)) => {
            let Value::Object(src) = value else {
                return Err(mismatch(path, from, to));
            };
            let mut target = match current {
                Some(Value::Object(existing)) => existing.clone(),
                _ => dst_type.zero_value(),
            };
            copy_fields(&mut target, dst_type, src, src_type, path)?;
            Ok(Value::Object(target))
        }
        (FieldType::List(src_el), FieldType::List(dst_el)) => {
            let Value::Array(items) = value else {
                return Err(mismatch(path, from, to));
            };
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = format!("{path}[{i}]");
                    match item {
                        Value::Null if dst_el.is_optional() => Ok(Value::Null),
                        Value::Null => Ok(dst_el.zero_value()),
                        _ => convert(item, src_el, dst_el, None, &item_path),
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        (FieldType::Record(_) | FieldType::List(_), _) | (_, FieldType::Record(_) | FieldType::List(_)) => {
            Err(mismatch(path, from, to))
        }
        (a, b) if a == b => Ok(value.clone()),
        (FieldType::Int, FieldType::Float) => value
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| mismatch(path, from, to)),
        (FieldType::Float, FieldType::Int) => value
            .as_f64()
            .map(|f| Value::from(f.trunc() as i64))
            .ok_or_else(|| mismatch(path, from, to)),
        (FieldType::Uuid | FieldType::Timestamp, FieldType::Text) => Ok(value.clone()),
        _ => Err(mismatch(path, from, to)),
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn mismatch(path: &str, from: &FieldType, to: &FieldType) -> CopyError {
    CopyError::TypeMismatch {
        field: path.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn entry() -> Arc<RecordType> {
        Arc::new(
            RecordType::new("Entry")
                .field(Field::new("lang", FieldType::Text))
                .field(Field::new("body", FieldType::Text)),
        )
    }

    #[test]
    fn same_type_copy_reproduces_every_value() {
        let address = Arc::new(
            RecordType::new("Address")
                .field(Field::new("city", FieldType::Text))
                .field(Field::new("zip", FieldType::optional(FieldType::Int))),
        );
        let record = RecordType::new("Profile")
            .field(Field::new("active", FieldType::Bool))
            .field(Field::new("age", FieldType::Int))
            .field(Field::new("score", FieldType::Float))
            .field(Field::new("nickname", FieldType::optional(FieldType::Text)))
            .field(Field::new("bio", FieldType::optional(FieldType::Text)))
            .field(Field::new("joined", FieldType::Timestamp))
            .field(Field::new("ref", FieldType::Uuid))
            .field(Field::new("extra", FieldType::Json))
            .field(Field::new("ratios", FieldType::List(Box::new(FieldType::Float))))
            .field(Field::new("home", FieldType::Record(address.clone())))
            .field(Field::new("entries", FieldType::List(Box::new(FieldType::Record(entry())))))
            .field(Field::new(
                "past",
                FieldType::List(Box::new(FieldType::Record(address))),
            ));

        let src = object(json!({
            "active": true,
            "age": 5,
            "score": 7.25,
            "nickname": "x",
            "bio": null,
            "joined": "2024-03-01T10:00:00Z",
            "ref": "6f1c2a7e-8a52-4c7d-9d4c-1b2a3c4d5e6f",
            "extra": {"tags": ["a", "b"]},
            "ratios": [1.5, 2.0],
            "home": {"city": "Cairo", "zip": 11511},
            "entries": [{"lang": "en", "body": "Hi"}, {"lang": "ar", "body": "Ahlan"}],
            "past": [{"city": "Giza", "zip": null}],
        }));

        let mut dst = record.zero_value();
        copy(&mut dst, &record, &src, &record).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn copies_matching_names_and_skips_nulls() {
        let src_type = RecordType::new("Params")
            .field(Field::new("title", FieldType::optional(FieldType::Text)))
            .field(Field::new("views", FieldType::optional(FieldType::Int)))
            .field(Field::new("unknown", FieldType::Text));
        let dst_type = RecordType::new("Post")
            .field(Field::new("title", FieldType::Text))
            .field(Field::new("views", FieldType::Int));

        let mut dst = object(json!({"title": "old", "views": 3}));
        let src = object(json!({"title": "new", "views": null, "unknown": "x"}));
        copy(&mut dst, &dst_type, &src, &src_type).unwrap();

        assert_eq!(Value::Object(dst), json!({"title": "new", "views": 3}));
    }

    #[test]
    fn widens_numbers_and_stringifies_identifiers() {
        let src_type = RecordType::new("Params")
            .field(Field::new("score", FieldType::Int))
            .field(Field::new("ratio", FieldType::Float))
            .field(Field::new("ref", FieldType::Uuid));
        let dst_type = RecordType::new("Row")
            .field(Field::new("score", FieldType::Float))
            .field(Field::new("ratio", FieldType::Int))
            .field(Field::new("ref", FieldType::optional(FieldType::Text)));

        let mut dst = dst_type.zero_value();
        let src = object(json!({
            "score": 4,
            "ratio": 2.9,
            "ref": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
        }));
        copy(&mut dst, &dst_type, &src, &src_type).unwrap();

        assert_eq!(dst["score"], json!(4.0));
        assert_eq!(dst["ratio"], json!(2));
        assert_eq!(dst["ref"], json!("6f9619ff-8b86-d011-b42d-00cf4fc964ff"));
    }

    #[test]
    fn copies_nested_lists_element_wise() {
        let src_type = RecordType::new("Params").field(Field::new(
            "entries",
            FieldType::List(Box::new(FieldType::Record(Arc::new(
                RecordType::new("EntryParams").field(Field::new("body", FieldType::Text)),
            )))),
        ));
        let dst_type = RecordType::new("Page").field(Field::new(
            "entries",
            FieldType::List(Box::new(FieldType::Record(entry()))),
        ));

        let mut dst = dst_type.zero_value();
        let src = object(json!({"entries": [{"body": "a"}, {"body": "b"}]}));
        copy(&mut dst, &dst_type, &src, &src_type).unwrap();

        assert_eq!(
            dst["entries"],
            json!([{"lang": "", "body": "a"}, {"lang": "", "body": "b"}])
        );
    }

    #[test]
    fn mismatch_reports_path_and_leaves_destination_untouched() {
        let src_type = RecordType::new("Params")
            .field(Field::new("title", FieldType::Text))
            .field(Field::new(
                "entries",
                FieldType::List(Box::new(FieldType::Record(Arc::new(
                    RecordType::new("EntryParams").field(Field::new("body", FieldType::Int)),
                )))),
            ));
        let dst_type = RecordType::new("Page")
            .field(Field::new("title", FieldType::Text))
            .field(Field::new(
                "entries",
                FieldType::List(Box::new(FieldType::Record(entry()))),
            ));

        let mut dst = object(json!({"title": "keep", "entries": []}));
        let src = object(json!({"title": "changed", "entries": [{"body": 1}, {"body": 2}]}));
        let err = copy(&mut dst, &dst_type, &src, &src_type).unwrap_err();

        assert_eq!(
            err,
            CopyError::TypeMismatch {
                field: "entries[0].body".into(),
                from: "int".into(),
                to: "string".into(),
            }
        );
        assert_eq!(Value::Object(dst), json!({"title": "keep", "entries": []}));
    }

    #[test]
    fn scalar_to_record_is_a_mismatch() {
        let src_type = RecordType::new("Params").field(Field::new("meta", FieldType::Text));
        let dst_type =
            RecordType::new("Row").field(Field::new("meta", FieldType::Record(entry())));
        let mut dst = dst_type.zero_value();
        let src = object(json!({"meta": "flat"}));
        assert!(matches!(
            copy(&mut dst, &dst_type, &src, &src_type),
            Err(CopyError::TypeMismatch { field, .. }) if field == "meta"
        ));
    }
}
