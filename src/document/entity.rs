//! Document entity and dirty tracking

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::errors::{DocumentError, DocumentResult};
use crate::schema::{KindSchema, ID_ATTRIBUTE, TYPE_ATTRIBUTE};
use crate::store::Cas;

/// Storage metadata from the last successful read or write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Storage key; cleared on destroy
    pub key: Option<String>,
    /// CAS of the last round-trip; kept on destroy
    pub cas: Option<Cas>,
}

/// One document of a kind
#[derive(Debug, Clone)]
pub struct Document {
    schema: Arc<KindSchema>,
    id: Option<String>,
    attributes: Map<String, Value>,
    /// Changed attribute -> value before the first change
    changes: BTreeMap<String, Value>,
    metadata: Metadata,
    frozen: bool,
}

impl Document {
    /// New unsaved document with every declared attribute at its default.
    pub fn new(schema: &Arc<KindSchema>) -> Self {
        let mut attributes = Map::new();
        attributes.insert(TYPE_ATTRIBUTE.to_string(), Value::String(schema.kind().to_string()));
        for def in schema.attributes() {
            attributes.insert(def.name.clone(), def.default.resolve().unwrap_or(Value::Null));
        }

        Self {
            schema: Arc::clone(schema),
            id: None,
            attributes,
            changes: BTreeMap::new(),
            metadata: Metadata::default(),
            frozen: false,
        }
    }

    /// New unsaved document that will be created under `id`.
    pub fn with_id(schema: &Arc<KindSchema>, id: impl Into<String>) -> Self {
        let mut doc = Self::new(schema);
        doc.id = Some(id.into());
        doc
    }

    /// Rebuilds a document from a stored value.
    ///
    /// A stored `type` other than the kind's discriminator fails with
    /// `KindMismatch` unless `ignore_kind` is set.
    pub fn from_stored(
        schema: &Arc<KindSchema>,
        key: &str,
        value: Value,
        cas: Cas,
        ignore_kind: bool,
    ) -> DocumentResult<Self> {
        let mut doc = Self::new(schema);
        doc.load(key, value, cas, ignore_kind)?;
        Ok(doc)
    }

    /// Replaces attributes and metadata with a stored value, dropping
    /// pending changes.
    pub(crate) fn load(&mut self, key: &str, value: Value, cas: Cas, ignore_kind: bool) -> DocumentResult<()> {
        let stored = match value {
            Value::Object(map) => map,
            _ => {
                return Err(DocumentError::NotAnObject {
                    key: key.to_string(),
                })
            }
        };

        let found = stored.get(TYPE_ATTRIBUTE).and_then(Value::as_str);
        if !ignore_kind && found != Some(self.schema.kind()) {
            return Err(DocumentError::KindMismatch {
                key: key.to_string(),
                expected: self.schema.kind().to_string(),
                found: found.map(str::to_string),
            });
        }

        let mut attributes = Map::new();
        attributes.insert(TYPE_ATTRIBUTE.to_string(), Value::String(self.schema.kind().to_string()));
        for def in self.schema.attributes() {
            let value = stored.get(&def.name).cloned().unwrap_or(Value::Null);
            attributes.insert(def.name.clone(), value);
        }
        // Undeclared stored attributes stay readable
        for (name, value) in stored {
            if name != ID_ATTRIBUTE && !attributes.contains_key(&name) {
                attributes.insert(name, value);
            }
        }

        self.attributes = attributes;
        self.id = Some(key.to_string());
        self.changes.clear();
        self.metadata = Metadata {
            key: Some(key.to_string()),
            cas: Some(cas),
        };
        Ok(())
    }

    pub fn schema(&self) -> &Arc<KindSchema> {
        &self.schema
    }

    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Sets the id of a document that holds no CAS yet.
    pub fn set_id(&mut self, id: impl Into<String>) -> DocumentResult<()> {
        if self.metadata.cas.is_some() {
            return Err(DocumentError::IdImmutable {
                id: self.id.clone().unwrap_or_default(),
            });
        }
        self.id = Some(id.into());
        Ok(())
    }

    pub(crate) fn clear_id(&mut self) {
        if self.metadata.cas.is_none() {
            self.id = None;
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn cas(&self) -> Option<Cas> {
        self.metadata.cas
    }

    pub fn is_new(&self) -> bool {
        self.metadata.cas.is_none() && self.metadata.key.is_none()
    }

    pub fn is_persisted(&self) -> bool {
        self.metadata.key.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.metadata.cas.is_some() && self.metadata.key.is_none()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Current value of an attribute (`type` included).
    pub fn read_attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Variant name of an enumeration attribute
    pub fn read_enum(&self, name: &str) -> Option<&str> {
        let def = self.schema.enum_def(name)?;
        let value = self.attributes.get(name)?.as_i64()?;
        def.variant_of(value)
    }

    /// Assigns a declared attribute, coercing it into the declared type.
    ///
    /// Enumeration attributes also accept a variant name.
    pub fn write_attribute(&mut self, name: &str, value: Value) -> DocumentResult<()> {
        if self.frozen {
            return Err(DocumentError::Frozen {
                id: self.id.clone().unwrap_or_default(),
            });
        }
        if name == TYPE_ATTRIBUTE || name == ID_ATTRIBUTE {
            return Err(DocumentError::ReservedAttribute {
                name: name.to_string(),
            });
        }

        let def = self
            .schema
            .attribute(name)
            .ok_or_else(|| DocumentError::UnknownAttribute {
                kind: self.schema.kind().to_string(),
                name: name.to_string(),
            })?;

        let variant_number = self
            .schema
            .enum_def(name)
            .and_then(|enum_def| value.as_str().map(|variant| enum_def.value_of(variant)));

        let value = match variant_number {
            Some(Some(number)) => Value::from(number),
            Some(None) => {
                let shown = value.as_str().unwrap_or_default().to_string();
                def.ty.coerce(value).map_err(|_| DocumentError::InvalidValue {
                    name: name.to_string(),
                    reason: format!("unknown variant '{}'", shown),
                })?
            }
            None => def.ty.coerce(value).map_err(|reason| DocumentError::InvalidValue {
                name: name.to_string(),
                reason,
            })?,
        };

        self.set_tracked(name, value);
        Ok(())
    }

    /// Assigns every entry of a JSON object, stopping at the first error.
    pub fn assign(&mut self, attributes: Value) -> DocumentResult<()> {
        match attributes {
            Value::Object(map) => {
                for (name, value) in map {
                    self.write_attribute(&name, value)?;
                }
                Ok(())
            }
            Value::Null => Ok(()),
            _ => Err(DocumentError::InvalidValue {
                name: "$root".to_string(),
                reason: "attributes must be a JSON object".to_string(),
            }),
        }
    }

    fn set_tracked(&mut self, name: &str, value: Value) {
        let current = self.attributes.get(name).cloned().unwrap_or(Value::Null);
        if current == value {
            return;
        }

        match self.changes.get(name) {
            Some(original) if *original == value => {
                self.changes.remove(name);
            }
            Some(_) => {}
            None => {
                self.changes.insert(name.to_string(), current);
            }
        }
        self.attributes.insert(name.to_string(), value);
    }

    /// All attributes, `type` first
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Returns true if any attribute changed since the last load or save.
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changed_attributes(&self) -> Vec<&str> {
        self.changes.keys().map(String::as_str).collect()
    }

    pub fn attribute_changed(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    /// Value before the first unsaved change, `None` if unchanged.
    pub fn previous_value(&self, name: &str) -> Option<&Value> {
        self.changes.get(name)
    }

    /// Value as last persisted: the previous value if changed, else current.
    pub fn persisted_value(&self, name: &str) -> Option<&Value> {
        self.changes.get(name).or_else(|| self.attributes.get(name))
    }

    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    /// Value written to the store: attributes with `type` forced and no `id`.
    pub fn payload(&self) -> Value {
        let mut payload = self.attributes.clone();
        payload.insert(TYPE_ATTRIBUTE.to_string(), Value::String(self.schema.kind().to_string()));
        payload.remove(ID_ATTRIBUTE);
        Value::Object(payload)
    }

    /// Payload with every enumeration forced into its variant range.
    /// The document itself is left as is.
    pub(crate) fn clamped_payload(&self) -> Value {
        let mut payload = self.payload();
        if let Value::Object(map) = &mut payload {
            for def in self.schema.enums() {
                let current = map.get(&def.name).unwrap_or(&Value::Null);
                let clamped = Value::from(def.clamp(current));
                map.insert(def.name.clone(), clamped);
            }
        }
        payload
    }

    /// Copies the enumeration values of a written payload back.
    pub(crate) fn apply_clamped(&mut self, written: &Value) {
        for def in self.schema.enums() {
            if let Some(value) = written.get(&def.name) {
                self.attributes.insert(def.name.clone(), value.clone());
            }
        }
    }

    pub(crate) fn mark_persisted(&mut self, key: String, cas: Cas) {
        self.id = Some(key.clone());
        self.metadata = Metadata {
            key: Some(key),
            cas: Some(cas),
        };
        self.changes.clear();
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.metadata.key = None;
        self.changes.clear();
        self.frozen = true;
    }
}
