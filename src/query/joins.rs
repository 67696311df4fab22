//! # JOIN Planner
//!
//! Assigns aliases and ON clauses for every JOIN one query build needs.
//!
//! A planner lives for exactly one build: the alias counter and the dedup map
//! are plain fields, created empty by `JoinPlanner::new` and dropped with it.
//! Two builds never share a planner, so concurrent requests cannot see each
//! other's aliases.
//!
//! Aliases follow `{table}_rel_{n}`. A related-model chain reads the counter
//! once; the junction alias and the related-table alias are both derived from
//! that single value before the counter moves.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::errors::{QueryError, QueryResult};
use crate::observability::Event;
use crate::schema::{ModelSchema, RelationshipDescriptor, SchemaRegistry};

/// What a JOIN was planned for. Also the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JoinKey {
    /// Junction table (or the related table of a direct relationship)
    Relationship { relationship: String },
    /// Related model table reached through a relationship
    RelatedModel { relationship: String, model: String },
    /// Target of a `related_record` field, for display projections
    RelatedRecord { field: String },
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKey::Relationship { relationship } => f.write_str(relationship),
            JoinKey::RelatedModel {
                relationship,
                model,
            } => write!(f, "{}.{}", relationship, model),
            JoinKey::RelatedRecord { field } => write!(f, "{} (display)", field),
        }
    }
}

/// `left_alias.left_column = right_alias.right_column`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnClause {
    pub left_alias: String,
    pub left_column: String,
    pub right_alias: String,
    pub right_column: String,
}

impl OnClause {
    /// True when the clause equates `a` with `b` (alias, column), in either order
    pub fn links(&self, a: (&str, &str), b: (&str, &str)) -> bool {
        let left = (self.left_alias.as_str(), self.left_column.as_str());
        let right = (self.right_alias.as_str(), self.right_column.as_str());
        (left == a && right == b) || (left == b && right == a)
    }
}

impl fmt::Display for OnClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = {}.{}",
            self.left_alias, self.left_column, self.right_alias, self.right_column
        )
    }
}

/// One planned JOIN
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinPlanEntry {
    pub key: JoinKey,
    pub table: String,
    pub alias: String,
    pub on: OnClause,
    /// Can multiply rows of the primary table
    pub fans_out: bool,
}

impl JoinPlanEntry {
    /// True for JOINs that only feed SELECT projections
    pub fn is_projection_only(&self) -> bool {
        matches!(self.key, JoinKey::RelatedRecord { .. })
    }
}

impl fmt::Display for JoinPlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LEFT JOIN {} AS {} ON {}", self.table, self.alias, self.on)
    }
}

/// Per-build JOIN planner
pub struct JoinPlanner<'a> {
    registry: &'a dyn SchemaRegistry,
    primary: &'a ModelSchema,
    counter: usize,
    aliases: HashMap<JoinKey, String>,
    used: HashSet<String>,
    joins: Vec<JoinPlanEntry>,
}

impl<'a> JoinPlanner<'a> {
    /// Fresh planner for one query against `primary`
    pub fn new(registry: &'a dyn SchemaRegistry, primary: &'a ModelSchema) -> Self {
        let mut used = HashSet::new();
        used.insert(primary.table.clone());
        Self {
            registry,
            primary,
            counter: 0,
            aliases: HashMap::new(),
            used,
            joins: Vec::new(),
        }
    }

    /// Alias of the primary table in FROM
    pub fn main_alias(&self) -> &str {
        &self.primary.table
    }

    /// Planned JOINs in emission order
    pub fn joins(&self) -> &[JoinPlanEntry] {
        &self.joins
    }

    pub fn into_joins(self) -> Vec<JoinPlanEntry> {
        self.joins
    }

    /// True when any filtering JOIN can multiply primary rows
    pub fn has_fan_out(&self) -> bool {
        self.joins.iter().any(|j| j.fans_out)
    }

    /// Plan (or reuse) the JOIN for `relationship`.
    ///
    /// With a junction table this joins the junction on the primary key.
    /// Without one it joins the related table on the foreign key.
    pub fn plan_relationship_join(&mut self, relationship: &str) -> QueryResult<String> {
        let key = JoinKey::Relationship {
            relationship: relationship.to_string(),
        };
        if let Some(alias) = self.aliases.get(&key) {
            return Ok(alias.clone());
        }

        let registry = self.registry;
        let rel = registry.relationship(&self.primary.name, relationship)?;
        let main = self.primary.table.clone();
        let n = self.counter;

        let entry = match &rel.table {
            Some(junction) => {
                let from_key = self.sides(rel)?.0;
                let alias = format!("{}_rel_{}", junction, n);
                JoinPlanEntry {
                    key: key.clone(),
                    table: junction.clone(),
                    on: OnClause {
                        left_alias: alias.clone(),
                        left_column: from_key,
                        right_alias: main,
                        right_column: self.primary.primary_key.clone(),
                    },
                    alias,
                    fans_out: rel.fans_out_from(&self.primary.name),
                }
            }
            None => {
                let (from_key, other_model, other_key) = self.sides(rel)?;
                let other = registry.model_schema(&other_model)?;
                let alias = format!("{}_rel_{}", other.table, n);
                JoinPlanEntry {
                    key: key.clone(),
                    table: other.table.clone(),
                    on: OnClause {
                        left_alias: main,
                        left_column: from_key,
                        right_alias: alias.clone(),
                        right_column: other_key,
                    },
                    alias,
                    fans_out: rel.fans_out_from(&self.primary.name),
                }
            }
        };

        self.counter += 1;
        self.record(entry)
    }

    /// Plan (or reuse) primary -> junction -> related model.
    ///
    /// An existing junction JOIN for the same relationship is reused.
    pub fn plan_related_model_join(&mut self, relationship: &str, model: &str) -> QueryResult<String> {
        let key = JoinKey::RelatedModel {
            relationship: relationship.to_string(),
            model: model.to_string(),
        };
        if let Some(alias) = self.aliases.get(&key) {
            return Ok(alias.clone());
        }

        let registry = self.registry;
        let rel = registry.relationship(&self.primary.name, relationship)?;
        let (_, other_model, other_key) = self.sides(rel)?;
        if other_model != model {
            return Err(self.defect(format!(
                "relationship '{}' leads to '{}', not '{}'",
                relationship, other_model, model
            )));
        }

        let junction = match &rel.table {
            Some(table) => table.clone(),
            None => {
                // The relationship JOIN already lands on the related table
                let alias = self.plan_relationship_join(relationship)?;
                self.aliases.insert(key, alias.clone());
                return Ok(alias);
            }
        };
        let related = registry.model_schema(model)?;
        let fans_out = rel.fans_out_from(&self.primary.name);

        let n = self.counter;
        let junction_key = JoinKey::Relationship {
            relationship: relationship.to_string(),
        };
        let junction_alias = match self.aliases.get(&junction_key) {
            Some(alias) => alias.clone(),
            None => {
                let (from_key, _, _) = self.sides(rel)?;
                let alias = format!("{}_rel_{}", junction, n);
                self.record(JoinPlanEntry {
                    key: junction_key,
                    table: junction,
                    on: OnClause {
                        left_alias: alias.clone(),
                        left_column: from_key,
                        right_alias: self.primary.table.clone(),
                        right_column: self.primary.primary_key.clone(),
                    },
                    alias,
                    fans_out,
                })?
            }
        };
        let related_alias = format!("{}_rel_{}", related.table, n);
        let entry = JoinPlanEntry {
            key,
            table: related.table.clone(),
            on: OnClause {
                left_alias: related_alias.clone(),
                left_column: related.primary_key.clone(),
                right_alias: junction_alias,
                right_column: other_key,
            },
            alias: related_alias,
            fans_out,
        };

        self.counter += 1;
        self.record(entry)
    }

    /// Plan (or reuse) the JOIN to a `related_record` field's target model.
    ///
    /// A filtering JOIN that already links `field` to the target's primary
    /// key is reused instead of joining the same row twice.
    pub fn plan_related_record_join(&mut self, field: &str) -> QueryResult<String> {
        let key = JoinKey::RelatedRecord {
            field: field.to_string(),
        };
        if let Some(alias) = self.aliases.get(&key) {
            return Ok(alias.clone());
        }

        let registry = self.registry;
        let primary = self.primary;
        let target = primary
            .field(field)
            .and_then(|f| f.related_model.as_deref())
            .ok_or_else(|| {
                self.defect(format!(
                    "'{}.{}' is not a related_record field",
                    primary.name, field
                ))
            })?;
        let related = registry.model_schema(target)?;

        let existing = self.joins.iter().find(|j| {
            !j.fans_out
                && j.table == related.table
                && j.on.links(
                    (primary.table.as_str(), field),
                    (j.alias.as_str(), related.primary_key.as_str()),
                )
        });
        if let Some(join) = existing {
            let alias = join.alias.clone();
            self.aliases.insert(key, alias.clone());
            return Ok(alias);
        }

        let alias = format!("{}_rel_{}", related.table, self.counter);
        let entry = JoinPlanEntry {
            key,
            table: related.table.clone(),
            on: OnClause {
                left_alias: alias.clone(),
                left_column: related.primary_key.clone(),
                right_alias: self.primary.table.clone(),
                right_column: field.to_string(),
            },
            alias,
            fans_out: false,
        };

        self.counter += 1;
        self.record(entry)
    }

    /// (from_key, other_model, other_key) as seen from the primary model
    fn sides(&self, rel: &RelationshipDescriptor) -> QueryResult<(String, String, String)> {
        let sides = rel.sides(&self.primary.name).ok_or_else(|| {
            QueryError::RelationshipNotFound(format!(
                "relationship '{}' does not involve '{}'",
                rel.name, self.primary.name
            ))
        })?;
        Ok((
            sides.from_key.to_string(),
            sides.other_model.to_string(),
            sides.other_key.to_string(),
        ))
    }

    fn record(&mut self, entry: JoinPlanEntry) -> QueryResult<String> {
        if !self.used.insert(entry.alias.clone()) {
            return Err(self.defect(format!("alias '{}' assigned twice", entry.alias)));
        }
        Event::JoinPlanned.emit(&[
            ("alias", &entry.alias),
            ("for", &entry.key.to_string()),
            ("table", &entry.table),
        ]);
        let alias = entry.alias.clone();
        self.aliases.insert(entry.key.clone(), alias.clone());
        self.joins.push(entry);
        Ok(alias)
    }

    fn defect(&self, message: String) -> QueryError {
        Event::JoinPlanningDefect.emit(&[("model", &self.primary.name), ("reason", &message)]);
        QueryError::JoinPlanning(message)
    }
}
