//! Schema registry backed by JSON files
//!
//! Every `*.json` file in the schema directory holds a bundle of models
//! and/or relationships:
//!
//! ```json
//! { "models": [ ... ], "relationships": [ ... ] }
//! ```
//!
//! Bundles are merged, then cross-references are checked once. Missing or
//! malformed files fail the load.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};
use super::types::{FieldType, ModelSchema, RelationshipDescriptor};
use super::SchemaRegistry;

/// On-disk file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaBundle {
    #[serde(default)]
    pub models: Vec<ModelSchema>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDescriptor>,
}

/// In-memory registry of models and relationships.
pub struct SchemaLoader {
    /// Directory containing schema bundles
    schema_dir: Option<PathBuf>,
    /// Models indexed by exact name
    models: HashMap<String, ModelSchema>,
    /// Relationships indexed by name
    relationships: HashMap<String, RelationshipDescriptor>,
}

impl SchemaLoader {
    /// Creates a loader reading bundles from `schema_dir`.
    pub fn new(schema_dir: &Path) -> Self {
        Self {
            schema_dir: Some(schema_dir.to_path_buf()),
            models: HashMap::new(),
            relationships: HashMap::new(),
        }
    }

    /// Creates an empty registry filled programmatically.
    pub fn in_memory() -> Self {
        Self {
            schema_dir: None,
            models: HashMap::new(),
            relationships: HashMap::new(),
        }
    }

    pub fn schema_dir(&self) -> Option<&Path> {
        self.schema_dir.as_deref()
    }

    /// Loads every bundle in the schema directory, then verifies references.
    pub fn load_all(&mut self) -> SchemaResult<()> {
        let dir = match &self.schema_dir {
            Some(dir) => dir.clone(),
            None => return Ok(()),
        };

        let entries = fs::read_dir(&dir).map_err(|e| {
            SchemaError::malformed(
                dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Directory order is platform dependent
        paths.sort();

        for path in paths {
            self.load_bundle_file(&path)?;
        }

        self.verify_references()
    }

    fn load_bundle_file(&mut self, path: &Path) -> SchemaResult<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;

        let bundle: SchemaBundle = serde_json::from_str(&content).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;

        self.register_bundle(bundle)
    }

    /// Registers every model and relationship of a bundle.
    pub fn register_bundle(&mut self, bundle: SchemaBundle) -> SchemaResult<()> {
        for model in bundle.models {
            self.register_model(model)?;
        }
        for relationship in bundle.relationships {
            self.register_relationship(relationship)?;
        }
        Ok(())
    }

    /// Registers a model. Names are unique and case sensitive.
    pub fn register_model(&mut self, model: ModelSchema) -> SchemaResult<()> {
        model
            .validate_structure()
            .map_err(|e| SchemaError::malformed(model.name.clone(), e))?;
        if self.models.contains_key(&model.name) {
            return Err(SchemaError::duplicate("model", &model.name));
        }
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    /// Registers a relationship descriptor.
    pub fn register_relationship(&mut self, relationship: RelationshipDescriptor) -> SchemaResult<()> {
        relationship
            .validate_structure()
            .map_err(|e| SchemaError::malformed(relationship.name.clone(), e))?;
        if self.relationships.contains_key(&relationship.name) {
            return Err(SchemaError::duplicate("relationship", &relationship.name));
        }
        self.relationships
            .insert(relationship.name.clone(), relationship);
        Ok(())
    }

    /// Checks that every name a model or relationship refers to is registered.
    pub fn verify_references(&self) -> SchemaResult<()> {
        let mut model_names: Vec<&String> = self.models.keys().collect();
        model_names.sort();

        for name in model_names {
            let model = &self.models[name];
            for rel_name in &model.relationships {
                let rel = self.relationships.get(rel_name).ok_or_else(|| {
                    SchemaError::malformed(
                        model.name.clone(),
                        format!("unknown relationship '{}'", rel_name),
                    )
                })?;
                if !rel.involves(&model.name) {
                    return Err(SchemaError::malformed(
                        model.name.clone(),
                        format!("relationship '{}' does not involve this model", rel_name),
                    ));
                }
            }
            for field in &model.fields {
                if field.field_type != FieldType::RelatedRecord {
                    continue;
                }
                if let Some(target) = &field.related_model {
                    if !self.models.contains_key(target) {
                        return Err(SchemaError::malformed(
                            model.name.clone(),
                            format!("field '{}' points at unknown model '{}'", field.name, target),
                        ));
                    }
                }
            }
        }

        for rel in self.relationships.values() {
            for side in [&rel.model_a, &rel.model_b] {
                let model = self.models.get(side).ok_or_else(|| {
                    SchemaError::malformed(rel.name.clone(), format!("unknown model '{}'", side))
                })?;
                if rel.table.as_deref() == Some(model.table.as_str()) {
                    return Err(SchemaError::malformed(
                        rel.name.clone(),
                        "junction table must differ from the model tables",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns the number of registered models.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Returns the number of registered relationships.
    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Returns all registered models, sorted by name.
    pub fn all_models(&self) -> Vec<&ModelSchema> {
        let mut models: Vec<&ModelSchema> = self.models.values().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }
}

impl SchemaRegistry for SchemaLoader {
    fn model_schema(&self, model: &str) -> SchemaResult<&ModelSchema> {
        self.models
            .get(model)
            .ok_or_else(|| SchemaError::schema_not_found(model))
    }

    fn relationship(&self, model: &str, relationship: &str) -> SchemaResult<&RelationshipDescriptor> {
        let schema = self.model_schema(model)?;
        if !schema.has_relationship(relationship) {
            return Err(SchemaError::relationship_not_found(model, relationship));
        }
        self.relationships
            .get(relationship)
            .filter(|rel| rel.involves(model))
            .ok_or_else(|| SchemaError::relationship_not_found(model, relationship))
    }
}
