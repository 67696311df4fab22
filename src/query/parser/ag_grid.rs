//! AG-Grid server-side row model
//!
//! `startRow`/`endRow` give the window. `filterModel` is a JSON object keyed
//! by column id; `sortModel` is a JSON array of `{colId, sort}`.
//! Operators without an AG-Grid equivalent are not encoded.

use serde_json::{json, Map, Value};

use super::{json_param, saturating_u64, ParsedRequest, RawParams};
use crate::query::config::QueryConfig;
use crate::query::descriptor::{
    CriteriaEntry, CriteriaValue, Pagination, QueryDescriptor, ResponseFormat, SearchSpec,
    SortDirection, SortSpec,
};
use crate::query::errors::{RejectedFilter, RejectionReason};
use crate::query::operators::{Operator, ValueShape};
use crate::schema::ModelSchema;

const FILTER_TYPES: &[(&str, Operator)] = &[
    ("equals", Operator::Equals),
    ("notEqual", Operator::NotEquals),
    ("contains", Operator::Contains),
    ("startsWith", Operator::StartsWith),
    ("endsWith", Operator::EndsWith),
    ("lessThan", Operator::Lt),
    ("lessThanOrEqual", Operator::Lte),
    ("greaterThan", Operator::Gt),
    ("greaterThanOrEqual", Operator::Gte),
    ("inRange", Operator::Between),
    ("blank", Operator::IsNull),
    ("notBlank", Operator::IsNotNull),
];

fn operator_for(filter_type: &str) -> Option<Operator> {
    match filter_type {
        // Pre-v26 name
        "empty" => Some(Operator::IsNull),
        other => FILTER_TYPES
            .iter()
            .find(|(name, _)| *name == other)
            .map(|(_, op)| *op),
    }
}

fn filter_type_for(op: Operator) -> Option<&'static str> {
    FILTER_TYPES
        .iter()
        .find(|(_, candidate)| *candidate == op)
        .map(|(name, _)| *name)
}

pub(super) fn parse(
    params: &RawParams,
    schema: &ModelSchema,
    config: &QueryConfig,
) -> Option<ParsedRequest> {
    if !params.contains_key("startRow") && !params.contains_key("endRow") {
        return None;
    }

    let start = params
        .get("startRow")
        .and_then(|s| saturating_u64(s))
        .unwrap_or(0);
    let end = params.get("endRow").and_then(|s| saturating_u64(s));
    let requested = match end {
        Some(end) if end > start => end - start,
        _ => config.default_page_size,
    };
    let pagination = Pagination::new(start, config.clamp_page_size(requested));

    let mut parsed = ParsedRequest::new(
        QueryDescriptor::new(&schema.name, pagination.limit)
            .with_pagination(pagination)
            .with_format(ResponseFormat::AgGrid),
    );

    match json_param(params, "filterModel") {
        Some(Ok(Value::Object(columns))) => {
            for (column, spec) in &columns {
                parse_column(column, spec, &mut parsed);
            }
        }
        Some(Ok(Value::Null)) | None => {}
        Some(Ok(_)) => parsed.reject(RejectedFilter::new(
            "filterModel",
            RejectionReason::Unparseable,
            "filterModel must be an object keyed by column id",
        )),
        Some(Err(rejected)) => parsed.reject(rejected),
    }

    match json_param(params, "sortModel") {
        Some(Ok(Value::Array(items))) => {
            for item in &items {
                match parse_sort(item) {
                    Some(sort) => parsed.descriptor.sort.push(sort),
                    None => parsed.reject(RejectedFilter::new(
                        "sortModel",
                        RejectionReason::Unparseable,
                        format!("unreadable sort entry {}", item),
                    )),
                }
            }
        }
        Some(Ok(Value::Null)) | None => {}
        Some(Ok(_)) => parsed.reject(RejectedFilter::new(
            "sortModel",
            RejectionReason::Unparseable,
            "sortModel must be an array",
        )),
        Some(Err(rejected)) => parsed.reject(rejected),
    }

    if let Some(raw) = params.get("search") {
        parsed.descriptor.search = SearchSpec::parse(raw, Vec::new());
    }

    Some(parsed)
}

fn parse_column(column: &str, spec: &Value, parsed: &mut ParsedRequest) {
    let Some(obj) = spec.as_object() else {
        parsed.reject(RejectedFilter::new(
            column,
            RejectionReason::Unparseable,
            "column filter must be an object",
        ));
        return;
    };

    let conditions: Option<Vec<&Value>> = match obj.get("conditions") {
        Some(Value::Array(items)) => Some(items.iter().collect()),
        _ => {
            // Older combined form
            let legacy: Vec<&Value> = ["condition1", "condition2"]
                .iter()
                .filter_map(|k| obj.get(*k))
                .collect();
            (!legacy.is_empty()).then_some(legacy)
        }
    };

    let Some(conditions) = conditions else {
        parse_condition(column, obj, None, parsed);
        return;
    };

    let combinator = obj.get("operator").and_then(Value::as_str).unwrap_or("AND");
    if !combinator.eq_ignore_ascii_case("AND") {
        parsed.reject(
            RejectedFilter::new(
                column,
                RejectionReason::Unparseable,
                format!("'{}' combined conditions are not supported", combinator),
            )
            .with_suggestions(vec!["AND".to_string()]),
        );
        return;
    }

    let inherited = obj.get("filterType").and_then(Value::as_str);
    for condition in conditions {
        match condition.as_object() {
            Some(c) => parse_condition(column, c, inherited, parsed),
            None => parsed.reject(RejectedFilter::new(
                column,
                RejectionReason::Unparseable,
                "condition must be an object",
            )),
        }
    }
}

fn parse_condition(
    column: &str,
    condition: &Map<String, Value>,
    inherited_type: Option<&str>,
    parsed: &mut ParsedRequest,
) {
    let filter_type = condition
        .get("filterType")
        .and_then(Value::as_str)
        .or(inherited_type)
        .unwrap_or("text");

    if filter_type == "set" {
        match condition.get("values") {
            Some(Value::Array(values)) => parsed.descriptor.criteria.push(CriteriaEntry::new(
                column,
                Operator::In,
                CriteriaValue::List(values.clone()),
            )),
            _ => parsed.reject(RejectedFilter::value_shape_invalid(
                column,
                Operator::In,
                "set filter needs a 'values' array",
            )),
        }
        return;
    }

    let type_name = condition.get("type").and_then(Value::as_str).unwrap_or("");
    let Some(op) = operator_for(type_name) else {
        parsed.reject(
            RejectedFilter::new(
                column,
                RejectionReason::Unparseable,
                format!("unsupported filter type '{}'", type_name),
            )
            .with_operator(type_name)
            .with_suggestions(FILTER_TYPES.iter().map(|(n, _)| n.to_string()).collect()),
        );
        return;
    };

    let (from_key, to_key) = if filter_type == "date" {
        ("dateFrom", "dateTo")
    } else {
        ("filter", "filterTo")
    };
    let operand = |key: &str| condition.get(key).filter(|v| !v.is_null()).cloned();

    let value = match op.value_shape() {
        ValueShape::Nothing => Some(CriteriaValue::None),
        ValueShape::Scalar => operand(from_key).map(CriteriaValue::Scalar),
        ValueShape::Pair => match (operand(from_key), operand(to_key)) {
            (Some(low), Some(high)) => Some(CriteriaValue::Pair(low, high)),
            _ => None,
        },
        ValueShape::List => None,
    };

    match value {
        Some(value) => parsed
            .descriptor
            .criteria
            .push(CriteriaEntry::new(column, op, value)),
        None => parsed.reject(RejectedFilter::value_shape_invalid(
            column,
            op,
            format!("'{}' filter is missing its value", type_name),
        )),
    }
}

fn parse_sort(item: &Value) -> Option<SortSpec> {
    let field = item.get("colId")?.as_str()?;
    let direction = SortDirection::parse(item.get("sort")?.as_str()?)?;
    Some(SortSpec {
        field: field.to_string(),
        direction,
    })
}

pub(super) fn encode(descriptor: &QueryDescriptor) -> RawParams {
    let mut params = RawParams::new();
    let Pagination { offset, limit } = descriptor.pagination;
    params.insert("startRow".into(), offset.to_string());
    params.insert("endRow".into(), (offset + limit).to_string());

    // Column id -> conditions, in first-seen order
    let mut columns: Vec<(String, Vec<Value>)> = Vec::new();
    for entry in &descriptor.criteria {
        let Some(condition) = encode_condition(entry) else {
            continue;
        };
        match columns.iter_mut().find(|(k, _)| *k == entry.key) {
            Some((_, conditions)) => conditions.push(condition),
            None => columns.push((entry.key.clone(), vec![condition])),
        }
    }
    if !columns.is_empty() {
        let model: Map<String, Value> = columns
            .into_iter()
            .map(|(column, mut conditions)| {
                let spec = if conditions.len() == 1 {
                    conditions.remove(0)
                } else {
                    json!({ "operator": "AND", "conditions": conditions })
                };
                (column, spec)
            })
            .collect();
        params.insert("filterModel".into(), Value::Object(model).to_string());
    }

    if !descriptor.sort.is_empty() {
        let sort: Vec<Value> = descriptor
            .sort
            .iter()
            .map(|s| json!({ "colId": s.field, "sort": s.direction.as_str() }))
            .collect();
        params.insert("sortModel".into(), Value::Array(sort).to_string());
    }

    if let Some(search) = &descriptor.search {
        params.insert("search".into(), search.to_input());
    }
    params
}

fn encode_condition(entry: &CriteriaEntry) -> Option<Value> {
    if entry.operator == Operator::In {
        if let CriteriaValue::List(values) = &entry.value {
            return Some(json!({ "filterType": "set", "values": values }));
        }
    }
    let type_name = filter_type_for(entry.operator)?;
    let kind = |v: &Value| if v.is_number() { "number" } else { "text" };

    let condition = match &entry.value {
        CriteriaValue::None => json!({ "filterType": "text", "type": type_name }),
        CriteriaValue::Scalar(v) => json!({ "filterType": kind(v), "type": type_name, "filter": v }),
        CriteriaValue::Pair(low, high) => json!({
            "filterType": kind(low),
            "type": type_name,
            "filter": low,
            "filterTo": high,
        }),
        CriteriaValue::List(_) => return None,
    };
    Some(condition)
}
