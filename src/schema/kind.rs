//! Per-kind schema descriptor
//!
//! A `KindSchema` is built once and shared as `Arc<KindSchema>` by every
//! document of that kind. Lookups are by name over declaration-ordered
//! tables.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{SchemaError, SchemaResult};
use super::types::{AttrType, AttributeDef, DefaultValue, EnumDef, IndexDef};

/// Attribute holding the kind discriminator
pub const TYPE_ATTRIBUTE: &str = "type";

/// Attribute name reserved for the document id
pub const ID_ATTRIBUTE: &str = "id";

/// Returns true if `name` is non-empty `[A-Za-z0-9_]`.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Immutable description of one document kind
#[derive(Debug)]
pub struct KindSchema {
    kind: String,
    attributes: Vec<AttributeDef>,
    enums: Vec<EnumDef>,
    indexes: Vec<IndexDef>,
}

impl KindSchema {
    /// Starts a schema for `kind`.
    pub fn builder(kind: impl Into<String>) -> KindSchemaBuilder {
        KindSchemaBuilder {
            kind: kind.into(),
            attributes: Vec::new(),
            enums: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Kind discriminator, also the id prefix
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn enums(&self) -> &[EnumDef] {
        &self.enums
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Indexes that reject duplicate values on save
    pub fn unique_indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.indexes.iter().filter(|i| i.unique)
    }
}

/// Collects declarations; everything is checked in [`build`](Self::build).
#[derive(Debug)]
pub struct KindSchemaBuilder {
    kind: String,
    attributes: Vec<AttributeDef>,
    enums: Vec<EnumDef>,
    indexes: Vec<IndexDef>,
}

impl KindSchemaBuilder {
    pub fn attribute(mut self, def: AttributeDef) -> Self {
        self.attributes.push(def);
        self
    }

    /// Optional attribute without a default
    pub fn field(self, name: &str, ty: AttrType) -> Self {
        self.attribute(AttributeDef::new(name, ty))
    }

    /// Integer attribute restricted to the variants of `def`
    pub fn enumeration(mut self, def: EnumDef) -> Self {
        self.enums.push(def);
        self
    }

    /// Lookup-only index
    pub fn index(mut self, def: IndexDef) -> Self {
        self.indexes.push(def);
        self
    }

    /// Unique index over `attributes`, named after them
    pub fn ensure_unique(self, attributes: &[&str]) -> Self {
        self.index(IndexDef::new(attributes).unique())
    }

    /// Validates the declarations and freezes the schema.
    ///
    /// # Errors
    ///
    /// - `InvalidName` for kind or index names outside `[A-Za-z0-9_]`
    /// - `ReservedAttribute` for `type` or `id`
    /// - `DuplicateAttribute` / `DuplicateIndex`
    /// - `UnknownAttribute` for an index over an undeclared attribute
    /// - `InvalidEnum` for an empty enumeration or unknown default
    pub fn build(self) -> SchemaResult<Arc<KindSchema>> {
        let kind = self.kind;
        if !is_identifier(&kind) {
            return Err(SchemaError::invalid_name(&kind, "kind", &kind));
        }

        let mut attributes = self.attributes;

        // Each enumeration is backed by an integer attribute
        for def in &self.enums {
            if def.variants.is_empty() {
                return Err(SchemaError::invalid_enum(&kind, &def.name, "no variants"));
            }
            if let Some(default) = &def.default_variant {
                if def.value_of(default).is_none() {
                    return Err(SchemaError::invalid_enum(
                        &kind,
                        &def.name,
                        format!("unknown default variant '{}'", default),
                    ));
                }
            }
            attributes.push(AttributeDef {
                name: def.name.clone(),
                ty: AttrType::Integer,
                default: DefaultValue::Value(Value::from(def.default_value())),
                required: false,
            });
        }

        let mut seen = HashSet::new();
        for attr in &attributes {
            if attr.name.is_empty() {
                return Err(SchemaError::invalid_name(&kind, "attribute", &attr.name));
            }
            if attr.name == TYPE_ATTRIBUTE || attr.name == ID_ATTRIBUTE {
                return Err(SchemaError::reserved_attribute(&kind, &attr.name));
            }
            if !seen.insert(attr.name.as_str()) {
                return Err(SchemaError::duplicate_attribute(&kind, &attr.name));
            }
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if !is_identifier(&index.name) {
                return Err(SchemaError::invalid_name(&kind, "index", &index.name));
            }
            if !index_names.insert(index.name.as_str()) {
                return Err(SchemaError::duplicate_index(&kind, &index.name));
            }
            if index.attributes.is_empty() {
                return Err(SchemaError::invalid_name(&kind, "index", &index.name));
            }
            for attr in &index.attributes {
                if !seen.contains(attr.as_str()) {
                    return Err(SchemaError::unknown_attribute(&kind, &index.name, attr));
                }
            }
        }

        Ok(Arc::new(KindSchema {
            kind,
            attributes,
            enums: self.enums,
            indexes: self.indexes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaErrorCode;
    use serde_json::json;

    fn user() -> Arc<KindSchema> {
        KindSchema::builder("User")
            .attribute(AttributeDef::new("name", AttrType::String).required())
            .field("email", AttrType::String)
            .enumeration(EnumDef::new("role", &["member", "admin"]))
            .ensure_unique(&["email"])
            .index(IndexDef::new(&["name"]).named("by_name"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_by_name() {
        let schema = user();
        assert_eq!(schema.kind(), "User");
        assert!(schema.attribute("name").unwrap().required);
        assert!(schema.attribute("missing").is_none());
        assert_eq!(schema.index("email").unwrap().attributes, vec!["email"]);
        assert!(schema.index("by_name").is_some());
        assert_eq!(schema.unique_indexes().count(), 1);
    }

    #[test]
    fn test_enum_adds_integer_attribute() {
        let schema = user();
        let role = schema.attribute("role").unwrap();
        assert_eq!(role.ty, AttrType::Integer);
        assert_eq!(role.default.resolve(), Some(json!(1)));
        assert!(schema.enum_def("role").is_some());
    }

    #[test]
    fn test_rejects_bad_kind_name() {
        let err = KindSchema::builder("User#1").build().unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidName);

        let err = KindSchema::builder("My-Kind").build().unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidName);
    }

    #[test]
    fn test_rejects_reserved_attributes() {
        for reserved in ["type", "id"] {
            let err = KindSchema::builder("Doc")
                .field(reserved, AttrType::String)
                .build()
                .unwrap_err();
            assert_eq!(err.code(), SchemaErrorCode::ReservedAttribute);
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = KindSchema::builder("Doc")
            .field("a", AttrType::Any)
            .field("a", AttrType::Any)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::DuplicateAttribute);

        let err = KindSchema::builder("Doc")
            .field("a", AttrType::Any)
            .index(IndexDef::new(&["a"]))
            .ensure_unique(&["a"])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::DuplicateIndex);
    }

    #[test]
    fn test_rejects_index_over_unknown_attribute() {
        let err = KindSchema::builder("Doc")
            .ensure_unique(&["ghost"])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::UnknownAttribute);
    }

    #[test]
    fn test_rejects_unknown_enum_default() {
        let err = KindSchema::builder("Doc")
            .enumeration(EnumDef::new("level", &["low"]).with_default("high"))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidEnum);

        let err = KindSchema::builder("Doc")
            .enumeration(EnumDef::new("level", &[]))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidEnum);
    }
}
