//! Attribute, enumeration and index definitions
//!
//! Supported attribute types:
//! - any: stored as given
//! - string: UTF-8 string
//! - integer: 64-bit signed integer
//! - float: 64-bit floating point
//! - boolean

use serde_json::{Number, Value};

/// Declared type of an attribute. Assignments are coerced into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Any,
    String,
    Integer,
    Float,
    Boolean,
}

impl AttrType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrType::Any => "any",
            AttrType::String => "string",
            AttrType::Integer => "integer",
            AttrType::Float => "float",
            AttrType::Boolean => "boolean",
        }
    }

    /// Coerces `value` into this type. `null` is accepted by every type.
    ///
    /// Returns the reason as `Err` when no lossless conversion exists.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(value);
        }

        match self {
            AttrType::Any => Ok(value),
            AttrType::String => match value {
                Value::String(_) => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(mismatch(self, &other)),
            },
            AttrType::Integer => match &value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(Value::from(f as i64))
                    }
                    _ => Err(mismatch(self, &value)),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| mismatch(self, &value)),
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                _ => Err(mismatch(self, &value)),
            },
            AttrType::Float => match &value {
                Value::Number(n) => n
                    .as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| mismatch(self, &value)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| mismatch(self, &value)),
                _ => Err(mismatch(self, &value)),
            },
            AttrType::Boolean => match &value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(mismatch(self, &value)),
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "f" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err(mismatch(self, &value)),
                },
                _ => Err(mismatch(self, &value)),
            },
        }
    }
}

fn mismatch(ty: &AttrType, value: &Value) -> String {
    format!("cannot coerce {} into {}", json_type_name(value), ty.type_name())
}

/// JSON type name of a value
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Value an attribute starts with on a new document
#[derive(Debug, Clone, Default)]
pub enum DefaultValue {
    #[default]
    None,
    Value(Value),
    /// Evaluated once per new document
    Computed(fn() -> Value),
}

impl DefaultValue {
    pub fn resolve(&self) -> Option<Value> {
        match self {
            DefaultValue::None => None,
            DefaultValue::Value(v) => Some(v.clone()),
            DefaultValue::Computed(f) => Some(f()),
        }
    }
}

/// One declared attribute
#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: String,
    pub ty: AttrType,
    pub default: DefaultValue,
    /// Must be present and non-blank to save
    pub required: bool,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: DefaultValue::None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = DefaultValue::Value(value);
        self
    }

    pub fn computed_default(mut self, f: fn() -> Value) -> Self {
        self.default = DefaultValue::Computed(f);
        self
    }
}

/// Named integer enumeration. Variants are numbered from 1 in
/// declaration order; the stored value is the number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<String>,
    pub default_variant: Option<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, variants: &[&str]) -> Self {
        Self {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            default_variant: None,
        }
    }

    pub fn with_default(mut self, variant: impl Into<String>) -> Self {
        self.default_variant = Some(variant.into());
        self
    }

    /// Number stored for `variant`
    pub fn value_of(&self, variant: &str) -> Option<i64> {
        self.variants
            .iter()
            .position(|v| v == variant)
            .map(|i| i as i64 + 1)
    }

    /// Variant name for a stored number
    pub fn variant_of(&self, value: i64) -> Option<&str> {
        if value < 1 {
            return None;
        }
        self.variants.get((value - 1) as usize).map(String::as_str)
    }

    /// Number used when no or an out-of-range value is held
    pub fn default_value(&self) -> i64 {
        self.default_variant
            .as_deref()
            .and_then(|v| self.value_of(v))
            .unwrap_or(1)
    }

    /// Integer view of `value` forced into `1..=len`.
    ///
    /// Strings are read by their leading digits, anything unreadable counts
    /// as 0 and therefore falls back to the default.
    pub fn clamp(&self, value: &Value) -> i64 {
        let raw = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .unwrap_or(0),
            Value::String(s) => leading_integer(s),
            Value::Bool(true) => 1,
            _ => 0,
        };
        if (1..=self.variants.len() as i64).contains(&raw) {
            raw
        } else {
            self.default_value()
        }
    }
}

fn leading_integer(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().unwrap_or(0)
}

/// Replaces the default pointer key encoding of an index
pub type KeyProcessor = fn(&[Value]) -> String;

/// Secondary index over one or more attributes
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: String,
    pub attributes: Vec<String>,
    /// Saves fail validation when another document holds the same values
    pub unique: bool,
    pub processor: Option<KeyProcessor>,
}

impl IndexDef {
    /// Index named after its attributes joined by `_`.
    pub fn new(attributes: &[&str]) -> Self {
        Self {
            name: attributes.join("_"),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            unique: false,
            processor: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn processor(mut self, processor: KeyProcessor) -> Self {
        self.processor = Some(processor);
        self
    }
}
