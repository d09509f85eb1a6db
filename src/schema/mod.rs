//! Kind schemas
//!
//! Every document kind is described by an explicit `KindSchema`: its
//! attributes (type, default, required-ness), enumerations and secondary
//! indexes. Documents consult the schema by name; nothing is generated.

mod errors;
mod kind;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult};
pub use kind::{is_identifier, KindSchema, KindSchemaBuilder, ID_ATTRIBUTE, TYPE_ATTRIBUTE};
pub use types::{
    json_type_name, AttrType, AttributeDef, DefaultValue, EnumDef, IndexDef, KeyProcessor,
};
pub use validator::{
    is_blank, validate_attributes, ValidationError, ValidationErrors, BLANK_MESSAGE, TAKEN_MESSAGE,
};
