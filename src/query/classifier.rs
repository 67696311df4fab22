//! # Criteria Classifier
//!
//! Splits criteria by dot depth so that every criterion sharing a JOIN is
//! compiled against the same alias:
//!
//! - depth 0 `field` -> direct
//! - depth 1 `relationship.field` -> relationship (junction columns)
//! - depth 2+ `relationship.Model.field` -> related
//!
//! Purely syntactic. Field existence was checked by the validator.

use std::collections::BTreeMap;

use super::descriptor::{CriteriaEntry, CriteriaValue};
use super::operators::Operator;

/// A criterion with its path prefix stripped
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCriterion {
    /// Column on the joined table
    pub field: String,
    pub operator: Operator,
    pub value: CriteriaValue,
    /// Key as it appeared in the descriptor
    pub key: String,
}

impl FieldCriterion {
    fn from_entry(entry: &CriteriaEntry, field: String) -> Self {
        Self {
            field,
            operator: entry.operator,
            value: entry.value.clone(),
            key: entry.key.clone(),
        }
    }
}

/// Criteria grouped by the JOIN they need
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedCriteria {
    pub direct: Vec<FieldCriterion>,
    /// Relationship name -> criteria on its junction table
    pub relationship: BTreeMap<String, Vec<FieldCriterion>>,
    /// (relationship, related model) -> criteria on the related table
    pub related: BTreeMap<(String, String), Vec<FieldCriterion>>,
}

impl ClassifiedCriteria {
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.relationship.is_empty() && self.related.is_empty()
    }

    /// Total number of criteria across all buckets
    pub fn len(&self) -> usize {
        self.direct.len()
            + self.relationship.values().map(Vec::len).sum::<usize>()
            + self.related.values().map(Vec::len).sum::<usize>()
    }
}

/// Partition criteria by dot depth, keeping request order within each group
pub fn classify(criteria: &[CriteriaEntry]) -> ClassifiedCriteria {
    let mut classified = ClassifiedCriteria::default();

    for entry in criteria {
        let segments = entry.segments();
        match segments.as_slice() {
            [field] => classified
                .direct
                .push(FieldCriterion::from_entry(entry, field.to_string())),
            [relationship, field] => classified
                .relationship
                .entry(relationship.to_string())
                .or_default()
                .push(FieldCriterion::from_entry(entry, field.to_string())),
            [relationship, model, rest @ ..] => classified
                .related
                .entry((relationship.to_string(), model.to_string()))
                .or_default()
                .push(FieldCriterion::from_entry(entry, rest.join("."))),
            [] => {}
        }
    }

    classified
}
