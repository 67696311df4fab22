//! # Filter/Search Validator
//!
//! Checks every criterion, sort and search field of a descriptor against the
//! model metadata before anything reaches SQL construction.
//!
//! Bad fragments are dropped and reported, never thrown one at a time. The
//! request only fails when the model itself is unknown, when strict mode is
//! on and something was rejected, or when criteria are required and none
//! survived.

use std::collections::HashSet;

use super::coerce::{coerce_value, compare_values};
use super::config::QueryConfig;
use super::descriptor::{CriteriaEntry, CriteriaValue, QueryDescriptor, SearchSpec, SortSpec};
use super::errors::{QueryError, QueryResult, RejectedFilter, RejectionReason};
use super::operators::{Operator, ValueShape};
use crate::observability::Event;
use crate::schema::{
    FieldDescriptor, FieldType, ModelSchema, SchemaErrorCode, SchemaRegistry,
};

/// Maximum edit distance for "did you mean" suggestions
const SUGGESTION_DISTANCE: usize = 2;

/// A descriptor holding only usable fragments, plus what was dropped
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    /// Criteria use canonical keys and coerced values. When a search is
    /// present its field list is fully resolved.
    pub descriptor: QueryDescriptor,
    pub rejected: Vec<RejectedFilter>,
}

/// A criterion key resolved against the metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// `field`, `relationship.junction_column` or `relationship.Model.field`
    pub canonical_key: String,
    pub field: FieldDescriptor,
}

/// Why a key could not be resolved
#[derive(Debug)]
pub enum ResolveError {
    /// Drop this criterion, keep going
    Rejected(RejectedFilter),
    /// Abort the request
    Fatal(QueryError),
}

impl From<QueryError> for ResolveError {
    fn from(err: QueryError) -> Self {
        ResolveError::Fatal(err)
    }
}

/// Resolve a dot-notation key to the field it targets.
///
/// Depth-1 keys naming a junction column stay depth-1. Depth-1 keys naming a
/// field of the related model are rewritten to `relationship.Model.field`.
/// At depth 2+ the model segment may be the related model's name or table.
pub fn resolve_field(
    registry: &dyn SchemaRegistry,
    primary: &ModelSchema,
    key: &str,
) -> Result<ResolvedField, ResolveError> {
    let segments: Vec<&str> = key.split('.').collect();
    let (relationship, rest) = match segments.as_slice() {
        [field] => {
            return primary
                .field(field)
                .map(|f| ResolvedField {
                    canonical_key: key.to_string(),
                    field: f.clone(),
                })
                .ok_or_else(|| {
                    ResolveError::Rejected(RejectedFilter::field_not_found(
                        key,
                        field,
                        &primary.name,
                        suggest(field, primary.field_names()),
                    ))
                });
        }
        [relationship, rest @ ..] => (*relationship, rest),
        [] => {
            return Err(ResolveError::Rejected(RejectedFilter::new(
                key,
                RejectionReason::Unparseable,
                "empty key",
            )))
        }
    };

    let rel = match registry.relationship(&primary.name, relationship) {
        Ok(rel) => rel,
        Err(e) if e.code() == SchemaErrorCode::RelationshipNotFound => {
            return Err(ResolveError::Rejected(
                RejectedFilter::new(
                    key,
                    RejectionReason::RelationshipNotFound,
                    format!(
                        "Model '{}' has no relationship '{}'",
                        primary.name, relationship
                    ),
                )
                .with_suggestions(suggest(
                    relationship,
                    primary.relationships.iter().map(String::as_str).collect(),
                )),
            ))
        }
        Err(e) => return Err(ResolveError::Fatal(e.into())),
    };
    let other_name = registry
        .resolve_other_model(rel, &primary.name)
        .map_err(QueryError::from)?;
    let other = registry
        .model_schema(&other_name)
        .map_err(QueryError::from)?;

    match rest {
        [field] => {
            if let Some(column) = rel.junction_field(field) {
                return Ok(ResolvedField {
                    canonical_key: key.to_string(),
                    field: column,
                });
            }
            if let Some(f) = other.field(field) {
                return Ok(ResolvedField {
                    canonical_key: format!("{}.{}.{}", relationship, other.name, field),
                    field: f.clone(),
                });
            }
            let junction = rel.junction_fields();
            let mut candidates: Vec<&str> = junction.iter().map(|f| f.name.as_str()).collect();
            candidates.extend(other.field_names());
            Err(ResolveError::Rejected(RejectedFilter::field_not_found(
                key,
                field,
                &format!("{} (via {})", other.name, relationship),
                suggest(field, candidates),
            )))
        }
        [model, path @ ..] if !path.is_empty() => {
            if *model != other.name && *model != other.table {
                return Err(ResolveError::Rejected(
                    RejectedFilter::new(
                        key,
                        RejectionReason::RelatedModelMismatch,
                        format!(
                            "Relationship '{}' leads to '{}', not '{}'",
                            relationship, other.name, model
                        ),
                    )
                    .with_suggestions(vec![other.name.clone()]),
                ));
            }
            let field = path.join(".");
            other
                .field(&field)
                .map(|f| ResolvedField {
                    canonical_key: format!("{}.{}.{}", relationship, other.name, field),
                    field: f.clone(),
                })
                .ok_or_else(|| {
                    ResolveError::Rejected(RejectedFilter::field_not_found(
                        key,
                        &field,
                        &other.name,
                        suggest(&field, other.field_names()),
                    ))
                })
        }
        _ => Err(ResolveError::Rejected(RejectedFilter::new(
            key,
            RejectionReason::Unparseable,
            format!("'{}' does not name a field", key),
        ))),
    }
}

/// Default search fields for a model.
///
/// An explicit `searchable_fields` list wins, then display columns of a
/// searchable type, then every text/email field. Password and image fields
/// are never included.
pub fn default_search_fields(schema: &ModelSchema) -> Vec<String> {
    let usable = |name: &String| {
        schema
            .field(name)
            .is_some_and(|f| !f.field_type.is_search_excluded())
    };

    if let Some(configured) = &schema.searchable_fields {
        return configured.iter().filter(|n| usable(n)).cloned().collect();
    }

    let display: Vec<String> = schema
        .display_columns
        .iter()
        .filter(|n| usable(n))
        .filter(|n| schema.field(n).is_some_and(|f| f.field_type.is_searchable()))
        .cloned()
        .collect();
    if !display.is_empty() {
        return display;
    }

    schema
        .fields
        .iter()
        .filter(|f| f.field_type.is_auto_searchable())
        .map(|f| f.name.clone())
        .collect()
}

/// Validator for one request
pub struct Validator<'a> {
    registry: &'a dyn SchemaRegistry,
    config: &'a QueryConfig,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry, config: &'a QueryConfig) -> Self {
        Self { registry, config }
    }

    /// Validate a parsed descriptor. `rejected` carries what the parser
    /// already dropped so the report is complete.
    pub fn validate(
        &self,
        descriptor: QueryDescriptor,
        mut rejected: Vec<RejectedFilter>,
    ) -> QueryResult<ValidatedQuery> {
        let primary = self.registry.model_schema(&descriptor.model)?;

        let criteria = self.validate_criteria(primary, &descriptor.criteria, &mut rejected)?;
        let sort = validate_sort(primary, &descriptor.sort, &mut rejected);
        let search = descriptor
            .search
            .as_ref()
            .and_then(|s| validate_search(primary, s, &mut rejected));

        for r in &rejected {
            Event::FilterRejected.emit(&[
                ("key", &r.key),
                ("model", &primary.name),
                ("reason", r.reason.code()),
            ]);
        }

        if self.config.strict && !rejected.is_empty() {
            return Err(QueryError::ValidationFailed(rejected));
        }
        if self.config.require_criteria && criteria.is_empty() && search.is_none() {
            return Err(QueryError::NoUsableCriteria(rejected));
        }

        Ok(ValidatedQuery {
            descriptor: QueryDescriptor {
                criteria,
                search,
                sort,
                ..descriptor
            },
            rejected,
        })
    }

    fn validate_criteria(
        &self,
        primary: &ModelSchema,
        criteria: &[CriteriaEntry],
        rejected: &mut Vec<RejectedFilter>,
    ) -> QueryResult<Vec<CriteriaEntry>> {
        let mut valid = Vec::with_capacity(criteria.len());

        for entry in criteria {
            let resolved = match resolve_field(self.registry, primary, &entry.key) {
                Ok(resolved) => resolved,
                Err(ResolveError::Rejected(r)) => {
                    rejected.push(r.with_operator(entry.operator.as_str()));
                    continue;
                }
                Err(ResolveError::Fatal(e)) => return Err(e),
            };

            let field = &resolved.field;
            if !field.supports(entry.operator) {
                rejected.push(RejectedFilter::operator_not_supported(
                    &entry.key,
                    entry.operator,
                    field.field_type.type_name(),
                    &field.supported_operators(),
                ));
                continue;
            }

            match normalize_value(field.field_type, entry.operator, &entry.value) {
                Ok(value) => valid.push(CriteriaEntry::new(
                    resolved.canonical_key,
                    entry.operator,
                    value,
                )),
                Err(message) => rejected.push(RejectedFilter::value_shape_invalid(
                    &entry.key,
                    entry.operator,
                    message,
                )),
            }
        }

        Ok(valid)
    }
}

/// Check the value shape for `op` and coerce every value to `field_type`
pub fn normalize_value(
    field_type: FieldType,
    op: Operator,
    value: &CriteriaValue,
) -> Result<CriteriaValue, String> {
    let shape = op.value_shape();
    let mismatch = || format!("'{}' expects {}", op, shape.describe());

    match (shape, value) {
        (ValueShape::Nothing, CriteriaValue::None) => Ok(CriteriaValue::None),
        (ValueShape::Scalar, CriteriaValue::Scalar(v)) => {
            let coerced = coerce_value(field_type, v)?;
            if op.is_pattern() && !coerced.is_string() {
                return Err(format!("'{}' expects text", op));
            }
            Ok(CriteriaValue::Scalar(coerced))
        }
        (ValueShape::List, CriteriaValue::List(items)) if !items.is_empty() => items
            .iter()
            .map(|v| coerce_value(field_type, v))
            .collect::<Result<Vec<_>, _>>()
            .map(CriteriaValue::List),
        (ValueShape::Pair, CriteriaValue::Pair(low, high)) => ordered_pair(field_type, low, high),
        (ValueShape::Pair, CriteriaValue::List(items)) if items.len() == 2 => {
            ordered_pair(field_type, &items[0], &items[1])
        }
        _ => Err(mismatch()),
    }
}

fn ordered_pair(
    field_type: FieldType,
    low: &serde_json::Value,
    high: &serde_json::Value,
) -> Result<CriteriaValue, String> {
    let low = coerce_value(field_type, low)?;
    let high = coerce_value(field_type, high)?;
    if compare_values(&low, &high) == Some(std::cmp::Ordering::Greater) {
        return Err(format!(
            "range is reversed: lower bound {} exceeds upper bound {}",
            low, high
        ));
    }
    Ok(CriteriaValue::Pair(low, high))
}

fn validate_sort(
    primary: &ModelSchema,
    sort: &[SortSpec],
    rejected: &mut Vec<RejectedFilter>,
) -> Vec<SortSpec> {
    let mut seen = HashSet::new();
    let mut valid = Vec::new();

    for spec in sort {
        match primary.field(&spec.field) {
            Some(f) if f.field_type == FieldType::Password => {
                rejected.push(RejectedFilter::new(
                    &spec.field,
                    RejectionReason::SortFieldInvalid,
                    format!("Cannot sort on password field '{}'", spec.field),
                ));
            }
            Some(_) => {
                if seen.insert(spec.field.clone()) {
                    valid.push(spec.clone());
                }
            }
            None => {
                rejected.push(
                    RejectedFilter::new(
                        &spec.field,
                        RejectionReason::SortFieldInvalid,
                        format!(
                            "Cannot sort on '{}': not a field of '{}'",
                            spec.field, primary.name
                        ),
                    )
                    .with_suggestions(suggest(&spec.field, primary.field_names())),
                );
            }
        }
    }

    valid
}

fn validate_search(
    primary: &ModelSchema,
    search: &SearchSpec,
    rejected: &mut Vec<RejectedFilter>,
) -> Option<SearchSpec> {
    let fields = if search.fields.is_empty() {
        default_search_fields(primary)
    } else {
        let mut fields = Vec::new();
        for name in &search.fields {
            match primary.field(name) {
                Some(f) if f.field_type.is_searchable() && !f.field_type.is_search_excluded() => {
                    if !fields.contains(name) {
                        fields.push(name.clone());
                    }
                }
                Some(f) => rejected.push(RejectedFilter::new(
                    name,
                    RejectionReason::SearchFieldInvalid,
                    format!(
                        "{} field '{}' cannot be searched",
                        f.field_type.type_name(),
                        name
                    ),
                )),
                None => rejected.push(
                    RejectedFilter::new(
                        name,
                        RejectionReason::SearchFieldInvalid,
                        format!("Cannot search '{}': not a field of '{}'", name, primary.name),
                    )
                    .with_suggestions(suggest(name, primary.field_names())),
                ),
            }
        }
        fields
    };

    if fields.is_empty() {
        rejected.push(RejectedFilter::new(
            "search",
            RejectionReason::SearchFieldInvalid,
            format!("Model '{}' has no searchable fields", primary.name),
        ));
        return None;
    }

    Some(SearchSpec {
        terms: search.terms.clone(),
        fields,
    })
}

/// Names within edit distance of `wanted`, closest first; all names if none are close
fn suggest(wanted: &str, candidates: Vec<&str>) -> Vec<String> {
    let mut close: Vec<(usize, &str)> = candidates
        .iter()
        .map(|c| (edit_distance(wanted, c), *c))
        .filter(|(d, _)| *d <= SUGGESTION_DISTANCE)
        .collect();
    if close.is_empty() {
        return candidates.into_iter().map(str::to_string).collect();
    }
    close.sort();
    close.into_iter().map(|(_, c)| c.to_string()).collect()
}

/// Levenshtein distance over chars
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}
