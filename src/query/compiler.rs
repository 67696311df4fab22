//! # SQL Criteria Compiler
//!
//! Turns a validated `QueryDescriptor` into one parameterised SELECT, a
//! matching COUNT and the JOIN plan both share.
//!
//! Identifiers come from verified schemas and are emitted unquoted. Every
//! value is bound as `?`; nothing from the request is spliced into the SQL
//! text. Column references to joined tables only ever use aliases handed out
//! by the build's `JoinPlanner`.
//!
//! Multi-value (multi_enum) columns are stored as JSON arrays and compared
//! with `JSON_CONTAINS` / `JSON_OVERLAPS`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::classifier::{classify, FieldCriterion};
use super::config::QueryConfig;
use super::descriptor::{CriteriaEntry, CriteriaValue, QueryDescriptor};
use super::errors::{QueryError, QueryResult};
use super::joins::{JoinPlanEntry, JoinPlanner};
use super::operators::Operator;
use super::validator::{default_search_fields, resolve_field, ResolveError};
use crate::observability::Event;
use crate::schema::{FieldType, ModelSchema, SchemaRegistry};

/// Output of one build
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    /// Bound in placeholder order: projection separators, then WHERE values
    pub params: Vec<Value>,
    pub count_sql: String,
    /// WHERE values only
    pub count_params: Vec<Value>,
    pub joins: Vec<JoinPlanEntry>,
    pub where_clauses: Vec<String>,
    pub order_by: Vec<String>,
    /// `CONCAT_WS(...) AS {field}_display` expressions
    pub projections: Vec<String>,
    pub distinct: bool,
    pub limit: u64,
    pub offset: u64,
}

/// One JOIN as shown by `explain`
#[derive(Debug, Clone, Serialize)]
pub struct ExplainedJoin {
    pub purpose: String,
    pub table: String,
    pub alias: String,
    pub on: String,
    pub fans_out: bool,
    pub used_by_count: bool,
}

/// Human-oriented summary of a compiled query
#[derive(Debug, Clone, Serialize)]
pub struct QueryExplain {
    pub sql: String,
    pub params: Vec<Value>,
    pub count_sql: String,
    pub joins: Vec<ExplainedJoin>,
    pub where_clauses: Vec<String>,
    pub order_by: Vec<String>,
    pub projections: Vec<String>,
    pub distinct: bool,
    pub limit: u64,
    pub offset: u64,
}

impl CompiledQuery {
    pub fn explain(&self) -> QueryExplain {
        QueryExplain {
            sql: self.sql.clone(),
            params: self.params.clone(),
            count_sql: self.count_sql.clone(),
            joins: self
                .joins
                .iter()
                .map(|j| ExplainedJoin {
                    purpose: j.key.to_string(),
                    table: j.table.clone(),
                    alias: j.alias.clone(),
                    on: j.on.to_string(),
                    fans_out: j.fans_out,
                    used_by_count: !j.is_projection_only(),
                })
                .collect(),
            where_clauses: self.where_clauses.clone(),
            order_by: self.order_by.clone(),
            projections: self.projections.clone(),
            distinct: self.distinct,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Compile `descriptor` with a fresh JOIN planner
pub fn compile(
    descriptor: &QueryDescriptor,
    registry: &dyn SchemaRegistry,
    config: &QueryConfig,
) -> QueryResult<CompiledQuery> {
    let primary = registry.model_schema(&descriptor.model)?;
    let mut planner = JoinPlanner::new(registry, primary);
    let main = planner.main_alias().to_string();

    // Canonical keys first, so equivalent spellings share one JOIN chain
    let mut field_types: HashMap<String, FieldType> = HashMap::new();
    let mut canonical = Vec::with_capacity(descriptor.criteria.len());
    for entry in &descriptor.criteria {
        let resolved = resolve_field(registry, primary, &entry.key).map_err(|e| match e {
            ResolveError::Rejected(r) => QueryError::InvalidRequest(r.message),
            ResolveError::Fatal(e) => e,
        })?;
        if !resolved.field.supports(entry.operator) {
            return Err(QueryError::InvalidRequest(format!(
                "operator '{}' is not supported for {} field '{}'",
                entry.operator,
                resolved.field.field_type.type_name(),
                entry.key
            )));
        }
        field_types.insert(resolved.canonical_key.clone(), resolved.field.field_type);
        canonical.push(CriteriaEntry::new(
            resolved.canonical_key,
            entry.operator,
            entry.value.clone(),
        ));
    }
    let classified = classify(&canonical);

    let mut where_clauses = Vec::new();
    let mut where_params = Vec::new();
    let mut push = |alias: &str, criterion: &FieldCriterion| -> QueryResult<()> {
        let field_type = field_types.get(&criterion.key).copied().ok_or_else(|| {
            QueryError::InvalidRequest(format!("unresolved criterion '{}'", criterion.key))
        })?;
        let column = format!("{}.{}", alias, criterion.field);
        let clause = criterion_sql(&column, field_type, criterion, &mut where_params)?;
        where_clauses.push(clause);
        Ok(())
    };

    for criterion in &classified.direct {
        push(&main, criterion)?;
    }
    for (relationship, criteria) in &classified.relationship {
        let alias = planner.plan_relationship_join(relationship)?;
        for criterion in criteria {
            push(&alias, criterion)?;
        }
    }
    for ((relationship, model), criteria) in &classified.related {
        let alias = planner.plan_related_model_join(relationship, model)?;
        for criterion in criteria {
            push(&alias, criterion)?;
        }
    }

    if let Some(search) = &descriptor.search {
        let fields = if search.fields.is_empty() {
            default_search_fields(primary)
        } else {
            search.fields.clone()
        };
        for field in &fields {
            match primary.field(field) {
                Some(f) if !f.field_type.is_search_excluded() => {}
                _ => {
                    return Err(QueryError::InvalidRequest(format!(
                        "'{}' is not a searchable field of '{}'",
                        field, primary.name
                    )))
                }
            }
        }
        if !fields.is_empty() {
            for term in &search.terms {
                let pattern = format!("%{}%", escape_like(term));
                let alternatives: Vec<String> = fields
                    .iter()
                    .map(|f| {
                        where_params.push(Value::String(pattern.clone()));
                        format!("{}.{} LIKE ?", main, f)
                    })
                    .collect();
                where_clauses.push(format!("({})", alternatives.join(" OR ")));
            }
        }
    }

    let filter_fan_out = planner.has_fan_out();
    let distinct = config.distinct_on_relationship_joins && filter_fan_out;

    let mut projections = Vec::new();
    let mut select_params = Vec::new();
    for (field, display) in display_targets(registry, primary)? {
        let alias = planner.plan_related_record_join(&field)?;
        let columns: Vec<String> = display.iter().map(|c| format!("{}.{}", alias, c)).collect();
        select_params.push(Value::String(config.display_name_separator.clone()));
        projections.push(format!(
            "CONCAT_WS(?, {}) AS {}_display",
            columns.join(", "),
            field
        ));
    }

    let order_by = order_clauses(primary, descriptor)?;
    let joins = planner.into_joins();
    let limit = descriptor.pagination.limit;
    let offset = descriptor.pagination.offset;

    let mut select_list = vec![format!("{}.*", main)];
    select_list.extend(projections.iter().cloned());
    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        if distinct { "DISTINCT " } else { "" },
        select_list.join(", "),
        main
    );
    for join in &joins {
        sql.push(' ');
        sql.push_str(&join.to_string());
    }
    sql.push_str(&where_sql);
    sql.push_str(&format!(" ORDER BY {}", order_by.join(", ")));
    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

    let count_expr = if distinct {
        format!("COUNT(DISTINCT {}.{})", main, primary.primary_key)
    } else {
        "COUNT(*)".to_string()
    };
    let mut count_sql = format!("SELECT {} AS total FROM {}", count_expr, main);
    for join in joins.iter().filter(|j| !j.is_projection_only()) {
        count_sql.push(' ');
        count_sql.push_str(&join.to_string());
    }
    count_sql.push_str(&where_sql);

    let mut params = select_params;
    params.extend(where_params.iter().cloned());

    Event::QueryCompiled.emit(&[
        ("distinct", if distinct { "true" } else { "false" }),
        ("joins", &joins.len().to_string()),
        ("model", &primary.name),
        ("params", &params.len().to_string()),
    ]);

    Ok(CompiledQuery {
        sql,
        params,
        count_sql,
        count_params: where_params,
        joins,
        where_clauses,
        order_by,
        projections,
        distinct,
        limit,
        offset,
    })
}

/// `related_record` fields whose target model has display columns
fn display_targets(
    registry: &dyn SchemaRegistry,
    primary: &ModelSchema,
) -> QueryResult<Vec<(String, Vec<String>)>> {
    let mut targets = Vec::new();
    for field in &primary.fields {
        let Some(model) = field.related_model.as_deref() else {
            continue;
        };
        if field.field_type != FieldType::RelatedRecord {
            continue;
        }
        let target = registry.model_schema(model)?;
        // Secrets and binary columns never end up in a label
        let columns: Vec<String> = target
            .display_columns
            .iter()
            .filter(|c| {
                target
                    .field(c)
                    .is_some_and(|f| !f.field_type.is_search_excluded())
            })
            .cloned()
            .collect();
        if !columns.is_empty() {
            targets.push((field.name.clone(), columns));
        }
    }
    Ok(targets)
}

/// Requested order plus the primary key tie-break
fn order_clauses(primary: &ModelSchema, descriptor: &QueryDescriptor) -> QueryResult<Vec<String>> {
    let main = &primary.table;
    let mut clauses = Vec::with_capacity(descriptor.sort.len() + 1);
    for spec in &descriptor.sort {
        if primary.field(&spec.field).is_none() {
            return Err(QueryError::InvalidRequest(format!(
                "cannot sort on '{}': not a field of '{}'",
                spec.field, primary.name
            )));
        }
        clauses.push(format!("{}.{} {}", main, spec.field, spec.direction.as_sql()));
    }
    if !descriptor.sort.iter().any(|s| s.field == primary.primary_key) {
        clauses.push(format!("{}.{} ASC", main, primary.primary_key));
    }
    Ok(clauses)
}

/// Escape LIKE wildcards; backslash is the default escape character
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// One WHERE fragment for `column`, pushing its bound values
fn criterion_sql(
    column: &str,
    field_type: FieldType,
    criterion: &FieldCriterion,
    params: &mut Vec<Value>,
) -> QueryResult<String> {
    let op = criterion.operator;
    let shape_error = || {
        QueryError::InvalidRequest(format!(
            "'{}' on '{}' expects {}",
            op,
            criterion.key,
            op.value_shape().describe()
        ))
    };
    let scalar = || match &criterion.value {
        CriteriaValue::Scalar(v) => Ok(v.clone()),
        _ => Err(shape_error()),
    };
    let list = || match &criterion.value {
        CriteriaValue::List(items) if !items.is_empty() => Ok(items.clone()),
        _ => Err(shape_error()),
    };

    if matches!(op, Operator::IsNull) {
        return Ok(format!("{} IS NULL", column));
    }
    if matches!(op, Operator::IsNotNull) {
        return Ok(format!("{} IS NOT NULL", column));
    }

    if field_type == FieldType::MultiEnum {
        let (sql, bound) = match op {
            Operator::Equals => (
                format!("JSON_CONTAINS({}, ?)", column),
                Value::Array(vec![scalar()?]),
            ),
            Operator::NotEquals => (
                format!("({0} IS NULL OR NOT JSON_CONTAINS({0}, ?))", column),
                Value::Array(vec![scalar()?]),
            ),
            Operator::Overlap | Operator::In => (
                format!("JSON_OVERLAPS({}, ?)", column),
                Value::Array(list()?),
            ),
            Operator::ContainsAll => (
                format!("JSON_CONTAINS({}, ?)", column),
                Value::Array(list()?),
            ),
            Operator::ContainsNone | Operator::NotIn => (
                format!("({0} IS NULL OR NOT JSON_OVERLAPS({0}, ?))", column),
                Value::Array(list()?),
            ),
            other => {
                return Err(QueryError::InvalidRequest(format!(
                    "operator '{}' has no SQL form for multi_enum field '{}'",
                    other, criterion.key
                )))
            }
        };
        // JSON functions take the candidate document as text
        params.push(Value::String(bound.to_string()));
        return Ok(sql);
    }

    let comparison = |symbol: &str, params: &mut Vec<Value>| -> QueryResult<String> {
        params.push(scalar()?);
        Ok(format!("{} {} ?", column, symbol))
    };
    let pattern = |prefix: &str, suffix: &str, params: &mut Vec<Value>| -> QueryResult<String> {
        let text = match scalar()? {
            Value::String(s) => s,
            other => other.to_string(),
        };
        params.push(Value::String(format!("{}{}{}", prefix, escape_like(&text), suffix)));
        Ok(format!("{} LIKE ?", column))
    };

    match op {
        Operator::Equals => comparison("=", params),
        Operator::NotEquals => comparison("<>", params),
        Operator::Gt => comparison(">", params),
        Operator::Gte => comparison(">=", params),
        Operator::Lt => comparison("<", params),
        Operator::Lte => comparison("<=", params),
        Operator::Contains => pattern("%", "%", params),
        Operator::StartsWith => pattern("", "%", params),
        Operator::EndsWith => pattern("%", "", params),
        Operator::In | Operator::NotIn => {
            let items = list()?;
            let keyword = if op == Operator::In { "IN" } else { "NOT IN" };
            let sql = format!("{} {} ({})", column, keyword, placeholders(items.len()));
            params.extend(items);
            Ok(sql)
        }
        Operator::Between => match &criterion.value {
            CriteriaValue::Pair(low, high) => {
                params.push(low.clone());
                params.push(high.clone());
                Ok(format!("{} BETWEEN ? AND ?", column))
            }
            _ => Err(shape_error()),
        },
        other => Err(QueryError::InvalidRequest(format!(
            "operator '{}' applies to multi_enum fields only, not '{}'",
            other, criterion.key
        ))),
    }
}
