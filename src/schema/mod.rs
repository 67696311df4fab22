//! Model metadata consumed by the query core
//!
//! The metadata subsystem owns these descriptors; the query core only reads
//! them. Schemas are validated when registered so that every identifier the
//! compiler emits is known to be safe.

mod errors;
mod loader;
mod registry;
mod types;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity};
pub use loader::{SchemaBundle, SchemaLoader};
pub use registry::SchemaRegistry;
pub use types::{
    is_safe_identifier, FieldDescriptor, FieldType, ModelSchema, RelationshipDescriptor,
    RelationshipKind, RelationshipSides,
};
