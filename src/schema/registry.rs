//! Read-only metadata lookups consumed by the query core

use super::errors::{SchemaError, SchemaResult};
use super::types::{ModelSchema, RelationshipDescriptor};

/// Schema registry trait (read-only)
///
/// Model names match exactly; there is no case-insensitive fallback.
pub trait SchemaRegistry {
    /// Look up a model by exact name
    fn model_schema(&self, model: &str) -> SchemaResult<&ModelSchema>;

    /// Look up a relationship attached to `model`
    fn relationship(&self, model: &str, relationship: &str) -> SchemaResult<&RelationshipDescriptor>;

    /// Name of the model on the other side of `relationship` from `from_model`
    fn resolve_other_model(
        &self,
        relationship: &RelationshipDescriptor,
        from_model: &str,
    ) -> SchemaResult<String> {
        relationship
            .other_model(from_model)
            .map(str::to_string)
            .ok_or_else(|| SchemaError::relationship_not_found(from_model, &relationship.name))
    }
}
