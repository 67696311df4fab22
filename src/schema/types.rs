//! Model metadata value objects
//!
//! Field, model and relationship descriptors as handed to the query core by
//! the metadata subsystem. They are built once (from JSON or in code) and
//! never mutated afterwards.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::query::operators::{self, Operator};

/// Declared field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Email,
    BigText,
    Integer,
    Float,
    Boolean,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Enum,
    MultiEnum,
    Password,
    RelatedRecord,
    Image,
    Id,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::BigText => "big_text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Enum => "enum",
            FieldType::MultiEnum => "multi_enum",
            FieldType::Password => "password",
            FieldType::RelatedRecord => "related_record",
            FieldType::Image => "image",
            FieldType::Id => "id",
        }
    }

    /// Types that may take part in a text search when configured to.
    pub fn is_searchable(&self) -> bool {
        matches!(
            self,
            FieldType::Text
                | FieldType::Email
                | FieldType::BigText
                | FieldType::Enum
                | FieldType::MultiEnum
        )
    }

    /// Types picked up by search auto-detection when nothing is configured.
    pub fn is_auto_searchable(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Email)
    }

    /// Secrets and binary payloads never take part in a search.
    pub fn is_search_excluded(&self) -> bool {
        matches!(self, FieldType::Password | FieldType::Image)
    }
}

/// A single field on a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Column name
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Per-instance operator set. Intersected with the type defaults, so it
    /// can only narrow what the type allows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operators: Option<BTreeSet<Operator>>,

    /// Target model of a `related_record` field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_model: Option<String>,
}

impl FieldDescriptor {
    /// Create a field with the type's default operator set
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            operators: None,
            related_model: None,
        }
    }

    /// Create a `related_record` field pointing at another model
    pub fn related(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            related_model: Some(model.into()),
            ..Self::new(name, FieldType::RelatedRecord)
        }
    }

    /// Narrow the operator set of this instance
    pub fn with_operators(mut self, ops: impl IntoIterator<Item = Operator>) -> Self {
        self.operators = Some(ops.into_iter().collect());
        self
    }

    /// Operators this field accepts
    pub fn supported_operators(&self) -> BTreeSet<Operator> {
        let defaults = operators::supported_operators(self.field_type);
        match &self.operators {
            Some(narrowed) => defaults.intersection(narrowed).copied().collect(),
            None => defaults,
        }
    }

    pub fn supports(&self, op: Operator) -> bool {
        self.supported_operators().contains(&op)
    }
}

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// A named relationship between two models
///
/// With a junction `table`, `model_a_key`/`model_b_key` are the junction
/// columns holding each model's primary key. Without one the relationship is
/// a direct foreign key and the keys are columns on the models' own tables,
/// joined as `a.model_a_key = b.model_b_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub kind: RelationshipKind,
    pub model_a: String,
    pub model_b: String,

    /// Junction table, if the relationship is stored in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    pub model_a_key: String,
    pub model_b_key: String,

    /// Extra columns stored on the junction table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_fields: Vec<FieldDescriptor>,
}

/// One side of a relationship as seen from a starting model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipSides<'a> {
    /// Key belonging to the starting model
    pub from_key: &'a str,
    /// Model on the other side
    pub other_model: &'a str,
    /// Key belonging to the other model
    pub other_key: &'a str,
}

impl RelationshipDescriptor {
    /// Create a relationship stored in a junction table
    pub fn junction(
        name: impl Into<String>,
        kind: RelationshipKind,
        table: impl Into<String>,
        (model_a, model_a_key): (&str, &str),
        (model_b, model_b_key): (&str, &str),
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            model_a: model_a.to_string(),
            model_b: model_b.to_string(),
            table: Some(table.into()),
            model_a_key: model_a_key.to_string(),
            model_b_key: model_b_key.to_string(),
            additional_fields: Vec::new(),
        }
    }

    /// Create a direct foreign-key relationship
    pub fn direct(
        name: impl Into<String>,
        kind: RelationshipKind,
        (model_a, model_a_key): (&str, &str),
        (model_b, model_b_key): (&str, &str),
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            model_a: model_a.to_string(),
            model_b: model_b.to_string(),
            table: None,
            model_a_key: model_a_key.to_string(),
            model_b_key: model_b_key.to_string(),
            additional_fields: Vec::new(),
        }
    }

    pub fn with_additional_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.additional_fields = fields;
        self
    }

    /// True when the relationship is stored in a junction table
    pub fn has_junction(&self) -> bool {
        self.table.is_some()
    }

    /// True when `model` participates in this relationship
    pub fn involves(&self, model: &str) -> bool {
        self.model_a == model || self.model_b == model
    }

    /// Keys and other model as seen from `from_model`.
    ///
    /// A self-referencing relationship is always walked from side A to B.
    pub fn sides(&self, from_model: &str) -> Option<RelationshipSides<'_>> {
        if self.model_a == from_model {
            Some(RelationshipSides {
                from_key: &self.model_a_key,
                other_model: &self.model_b,
                other_key: &self.model_b_key,
            })
        } else if self.model_b == from_model {
            Some(RelationshipSides {
                from_key: &self.model_b_key,
                other_model: &self.model_a,
                other_key: &self.model_a_key,
            })
        } else {
            None
        }
    }

    /// The model on the other side of `from_model`
    pub fn other_model(&self, from_model: &str) -> Option<&str> {
        self.sides(from_model).map(|s| s.other_model)
    }

    /// True when joining from `from_model` can multiply its rows.
    ///
    /// For one-to-many, model A is the "one" side.
    pub fn fans_out_from(&self, from_model: &str) -> bool {
        match self.kind {
            RelationshipKind::OneToOne => false,
            RelationshipKind::OneToMany => self.model_a == from_model,
            RelationshipKind::ManyToMany => true,
        }
    }

    /// Columns addressable on the junction table (both keys plus extras)
    pub fn junction_fields(&self) -> Vec<FieldDescriptor> {
        if !self.has_junction() {
            return Vec::new();
        }
        let mut fields = vec![
            FieldDescriptor::new(self.model_a_key.clone(), FieldType::Id),
            FieldDescriptor::new(self.model_b_key.clone(), FieldType::Id),
        ];
        fields.extend(self.additional_fields.iter().cloned());
        fields
    }

    /// Look up a junction column by name
    pub fn junction_field(&self, name: &str) -> Option<FieldDescriptor> {
        self.junction_fields().into_iter().find(|f| f.name == name)
    }

    /// Validates the descriptor structure itself
    pub fn validate_structure(&self) -> Result<(), String> {
        check_identifier("relationship name", &self.name)?;
        check_identifier("key", &self.model_a_key)?;
        check_identifier("key", &self.model_b_key)?;
        if let Some(table) = &self.table {
            check_identifier("junction table", table)?;
        }
        if !self.additional_fields.is_empty() && !self.has_junction() {
            return Err(format!(
                "relationship '{}' declares additional fields but has no junction table",
                self.name
            ));
        }
        check_unique_fields(&self.name, &self.junction_fields())
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Metadata for one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Model name (exact case)
    pub name: String,

    /// Backing table
    pub table: String,

    /// Primary key column (default: "id")
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Fields in declaration order
    pub fields: Vec<FieldDescriptor>,

    /// Relationships this model participates in
    #[serde(default)]
    pub relationships: Vec<String>,

    /// Human-readable representation, used for search and labels
    #[serde(default)]
    pub display_columns: Vec<String>,

    /// Explicit search configuration, wins over display columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable_fields: Option<Vec<String>>,
}

impl ModelSchema {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            fields,
            relationships: Vec::new(),
            display_columns: Vec::new(),
            searchable_fields: None,
        }
    }

    pub fn with_relationships(mut self, names: &[&str]) -> Self {
        self.relationships = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_display_columns(mut self, columns: &[&str]) -> Self {
        self.display_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_searchable_fields(mut self, fields: &[&str]) -> Self {
        self.searchable_fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Get a field by exact name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_relationship(&self, name: &str) -> bool {
        self.relationships.iter().any(|r| r == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Validates the schema structure itself (not a query)
    pub fn validate_structure(&self) -> Result<(), String> {
        check_identifier("model table", &self.table)?;
        check_identifier("primary key", &self.primary_key)?;
        for field in &self.fields {
            check_identifier("field", &field.name)?;
            if field.field_type == FieldType::RelatedRecord && field.related_model.is_none() {
                return Err(format!(
                    "related_record field '{}.{}' must name its related_model",
                    self.name, field.name
                ));
            }
        }
        check_unique_fields(&self.name, &self.fields)?;

        if self.field(&self.primary_key).is_none() {
            return Err(format!(
                "model '{}' must declare its primary key field '{}'",
                self.name, self.primary_key
            ));
        }
        for column in &self.display_columns {
            if self.field(column).is_none() {
                return Err(format!(
                    "display column '{}' is not a field of '{}'",
                    column, self.name
                ));
            }
        }
        if let Some(searchable) = &self.searchable_fields {
            for name in searchable {
                if self.field(name).is_none() {
                    return Err(format!(
                        "searchable field '{}' is not a field of '{}'",
                        name, self.name
                    ));
                }
            }
        }
        Ok(())
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// True when `name` can be emitted into SQL unquoted
pub fn is_safe_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

fn check_identifier(what: &str, name: &str) -> Result<(), String> {
    if is_safe_identifier(name) {
        Ok(())
    } else {
        Err(format!("invalid {} identifier '{}'", what, name))
    }
}

fn check_unique_fields(owner: &str, fields: &[FieldDescriptor]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(format!("duplicate field '{}' on '{}'", field.name, owner));
        }
    }
    Ok(())
}
