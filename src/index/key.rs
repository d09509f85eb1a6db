//! Pointer keys
//!
//! `"<kind>#<index>:<components>"`. Kind and index names are identifiers,
//! and `#` never appears in a document id, so pointer keys and document
//! keys cannot collide.
//!
//! Components default to the compact JSON array of the values, which keeps
//! distinct value lists on distinct keys (`null` and `"null"` differ, and a
//! separator inside a string is escaped). An index key processor replaces
//! the component encoding entirely.

use serde_json::Value;

use super::errors::{IndexError, IndexResult};
use crate::document::Document;
use crate::schema::{IndexDef, KindSchema};

/// Resolves `index_name` on `schema`.
pub fn index_def<'a>(schema: &'a KindSchema, index_name: &str) -> IndexResult<&'a IndexDef> {
    schema.index(index_name).ok_or_else(|| IndexError::UnknownIndex {
        kind: schema.kind().to_string(),
        index: index_name.to_string(),
    })
}

/// Builds the pointer key for `values`, one per indexed attribute.
pub fn pointer_key_for(schema: &KindSchema, index_name: &str, values: &[Value]) -> IndexResult<String> {
    let index = index_def(schema, index_name)?;
    if values.len() != index.attributes.len() {
        return Err(IndexError::Arity {
            index: index.name.clone(),
            expected: index.attributes.len(),
            got: values.len(),
        });
    }
    Ok(encode(schema, index, values))
}

pub(crate) fn encode(schema: &KindSchema, index: &IndexDef, values: &[Value]) -> String {
    let components = match index.processor {
        Some(processor) => processor(values),
        None => Value::Array(values.to_vec()).to_string(),
    };
    format!("{}#{}:{}", schema.kind(), index.name, components)
}

/// Current values of the indexed attributes
pub(crate) fn current_values(doc: &Document, index: &IndexDef) -> Vec<Value> {
    index
        .attributes
        .iter()
        .map(|a| doc.read_attribute(a).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Values as last persisted (previous value where changed)
pub(crate) fn persisted_values(doc: &Document, index: &IndexDef) -> Vec<Value> {
    index
        .attributes
        .iter()
        .map(|a| doc.persisted_value(a).cloned().unwrap_or(Value::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttrType;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn fold(values: &[Value]) -> String {
        values
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_lowercase())
            .collect::<Vec<_>>()
            .join("|")
    }

    fn schema() -> Arc<KindSchema> {
        KindSchema::builder("User")
            .field("email", AttrType::String)
            .field("first", AttrType::String)
            .field("last", AttrType::String)
            .ensure_unique(&["email"])
            .index(IndexDef::new(&["first", "last"]))
            .index(IndexDef::new(&["email"]).named("email_ci").processor(fold))
            .build()
            .unwrap()
    }

    #[test]
    fn test_key_format() {
        let key = pointer_key_for(&schema(), "email", &[json!("a@b.c")]).unwrap();
        assert_eq!(key, r#"User#email:["a@b.c"]"#);
    }

    #[test]
    fn test_key_is_deterministic() {
        let schema = schema();
        let a = pointer_key_for(&schema, "first_last", &[json!("Ann"), json!("Lee")]).unwrap();
        let b = pointer_key_for(&schema, "first_last", &[json!("Ann"), json!("Lee")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_values_give_distinct_keys() {
        let schema = schema();
        let inputs = [
            vec![json!("a-b"), json!("c")],
            vec![json!("a"), json!("b-c")],
            vec![json!(null), json!("x")],
            vec![json!("null"), json!("x")],
            vec![json!(1), json!("x")],
            vec![json!("1"), json!("x")],
            vec![json!("a\",\"b"), json!("c")],
            vec![json!("a"), json!("b\",\"c")],
        ];
        let keys: HashSet<String> = inputs
            .iter()
            .map(|values| pointer_key_for(&schema, "first_last", values).unwrap())
            .collect();
        assert_eq!(keys.len(), inputs.len());
    }

    #[test]
    fn test_processor_replaces_encoding() {
        let schema = schema();
        let upper = pointer_key_for(&schema, "email_ci", &[json!("A@B.C")]).unwrap();
        let lower = pointer_key_for(&schema, "email_ci", &[json!("a@b.c")]).unwrap();
        assert_eq!(upper, "User#email_ci:a@b.c");
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_unknown_index_and_arity() {
        let schema = schema();
        assert!(matches!(
            pointer_key_for(&schema, "missing", &[json!(1)]),
            Err(IndexError::UnknownIndex { .. })
        ));
        assert!(matches!(
            pointer_key_for(&schema, "first_last", &[json!("only")]),
            Err(IndexError::Arity { expected: 2, got: 1, .. })
        ));
    }
}
