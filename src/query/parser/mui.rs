//! MUI DataGrid server-side mode
//!
//! `page` is 0-based. `filterModel` carries `items` (`field`, `operator`,
//! `value`), an optional `logicOperator` and `quickFilterValues`; `sortModel`
//! is an array of `{field, sort}`. Items without a value yet are skipped, the
//! grid sends them while the user is still typing.

use serde_json::{json, Value};

use super::{json_param, page_size, saturating_u64, split_list, ParsedRequest, RawParams};
use crate::query::config::QueryConfig;
use crate::query::descriptor::{
    CriteriaEntry, CriteriaValue, Pagination, QueryDescriptor, ResponseFormat, SearchSpec,
    SortDirection, SortSpec,
};
use crate::query::errors::{RejectedFilter, RejectionReason};
use crate::query::operators::{Operator, ValueShape};
use crate::schema::ModelSchema;

fn operator_for(name: &str) -> Option<Operator> {
    let op = match name {
        "contains" => Operator::Contains,
        "equals" | "=" | "is" => Operator::Equals,
        "!=" | "not" | "doesNotEqual" => Operator::NotEquals,
        "startsWith" => Operator::StartsWith,
        "endsWith" => Operator::EndsWith,
        ">" | "after" => Operator::Gt,
        ">=" | "onOrAfter" => Operator::Gte,
        "<" | "before" => Operator::Lt,
        "<=" | "onOrBefore" => Operator::Lte,
        "isEmpty" => Operator::IsNull,
        "isNotEmpty" => Operator::IsNotNull,
        "isAnyOf" => Operator::In,
        _ => return None,
    };
    Some(op)
}

fn operator_name(op: Operator) -> Option<&'static str> {
    let name = match op {
        Operator::Contains => "contains",
        Operator::Equals => "equals",
        Operator::NotEquals => "!=",
        Operator::StartsWith => "startsWith",
        Operator::EndsWith => "endsWith",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::IsNull => "isEmpty",
        Operator::IsNotNull => "isNotEmpty",
        Operator::In => "isAnyOf",
        _ => return None,
    };
    Some(name)
}

fn is_mui_request(params: &RawParams) -> bool {
    let has_items = params
        .get("filterModel")
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .is_some_and(|model| model.get("items").is_some());
    let mui_sort = params
        .get("sortModel")
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|model| model.as_array().and_then(|a| a.first().cloned()))
        .is_some_and(|first| first.get("field").is_some());
    has_items || mui_sort || params.contains_key("pageSize")
}

pub(super) fn parse(
    params: &RawParams,
    schema: &ModelSchema,
    config: &QueryConfig,
) -> Option<ParsedRequest> {
    if !is_mui_request(params) {
        return None;
    }

    let size = page_size(params.get("pageSize"), config);
    let page = params
        .get("page")
        .and_then(|p| saturating_u64(p))
        .unwrap_or(0);
    let mut parsed = ParsedRequest::new(
        QueryDescriptor::new(&schema.name, size)
            .with_pagination(Pagination::new(page.saturating_mul(size), size))
            .with_format(ResponseFormat::MuiDataGrid),
    );

    match json_param(params, "filterModel") {
        Some(Ok(model)) => parse_filter_model(&model, &mut parsed),
        Some(Err(rejected)) => parsed.reject(rejected),
        None => {}
    }

    match json_param(params, "sortModel") {
        Some(Ok(Value::Array(items))) => {
            for item in &items {
                let field = item.get("field").and_then(Value::as_str);
                let direction = item.get("sort").and_then(Value::as_str);
                match (field, direction) {
                    (Some(field), Some(dir)) => match SortDirection::parse(dir) {
                        Some(direction) => parsed.descriptor.sort.push(SortSpec {
                            field: field.to_string(),
                            direction,
                        }),
                        None => parsed.reject(RejectedFilter::new(
                            field,
                            RejectionReason::Unparseable,
                            format!("unknown sort direction '{}'", dir),
                        )),
                    },
                    // Column with sorting switched off
                    (Some(_), None) => {}
                    _ => parsed.reject(RejectedFilter::new(
                        "sortModel",
                        RejectionReason::Unparseable,
                        format!("unreadable sort entry {}", item),
                    )),
                }
            }
        }
        Some(Ok(_)) => parsed.reject(RejectedFilter::new(
            "sortModel",
            RejectionReason::Unparseable,
            "sortModel must be an array",
        )),
        Some(Err(rejected)) => parsed.reject(rejected),
        None => {}
    }

    Some(parsed)
}

fn parse_filter_model(model: &Value, parsed: &mut ParsedRequest) {
    let logic = model
        .get("logicOperator")
        .or_else(|| model.get("linkOperator"))
        .and_then(Value::as_str)
        .unwrap_or("and");
    let items = model
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if logic.eq_ignore_ascii_case("or") && items.len() > 1 {
        parsed.reject(
            RejectedFilter::new(
                "filterModel",
                RejectionReason::Unparseable,
                "'or' logic between filter items is not supported",
            )
            .with_suggestions(vec!["and".to_string()]),
        );
    } else {
        for item in &items {
            parse_item(item, parsed);
        }
    }

    if let Some(Value::Array(values)) = model.get("quickFilterValues") {
        let mut terms: Vec<String> = Vec::new();
        for value in values.iter().filter_map(Value::as_str) {
            let term = value.trim();
            if !term.is_empty() && !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }
        if !terms.is_empty() {
            parsed.descriptor.search = Some(SearchSpec {
                terms,
                fields: Vec::new(),
            });
        }
    }
}

fn parse_item(item: &Value, parsed: &mut ParsedRequest) {
    let field = item
        .get("field")
        .or_else(|| item.get("columnField"))
        .and_then(Value::as_str);
    let operator = item
        .get("operator")
        .or_else(|| item.get("operatorValue"))
        .and_then(Value::as_str);

    let (Some(field), Some(name)) = (field, operator) else {
        parsed.reject(RejectedFilter::new(
            "filterModel",
            RejectionReason::Unparseable,
            format!("filter item needs 'field' and 'operator': {}", item),
        ));
        return;
    };
    let Some(op) = operator_for(name) else {
        parsed.reject(
            RejectedFilter::new(
                field,
                RejectionReason::Unparseable,
                format!("unsupported grid operator '{}'", name),
            )
            .with_operator(name),
        );
        return;
    };

    let value = item.get("value").filter(|v| !v.is_null());
    let criteria_value = match (op.value_shape(), value) {
        (ValueShape::Nothing, _) => CriteriaValue::None,
        (_, None) => return,
        (ValueShape::Scalar, Some(Value::String(s))) if s.is_empty() => return,
        (ValueShape::Scalar, Some(v)) if !v.is_array() && !v.is_object() => {
            CriteriaValue::Scalar(v.clone())
        }
        (ValueShape::List, Some(Value::Array(values))) if values.is_empty() => return,
        (ValueShape::List, Some(Value::Array(values))) => CriteriaValue::List(values.clone()),
        (ValueShape::List, Some(Value::String(s))) => CriteriaValue::List(split_list(s)),
        _ => {
            parsed.reject(RejectedFilter::value_shape_invalid(
                field,
                op,
                format!("unreadable value for '{}'", name),
            ));
            return;
        }
    };
    parsed
        .descriptor
        .criteria
        .push(CriteriaEntry::new(field, op, criteria_value));
}

pub(super) fn encode(descriptor: &QueryDescriptor) -> RawParams {
    let mut params = RawParams::new();
    let Pagination { offset, limit } = descriptor.pagination;
    params.insert("page".into(), (offset / limit.max(1)).to_string());
    params.insert("pageSize".into(), limit.to_string());

    let items: Vec<Value> = descriptor
        .criteria
        .iter()
        .filter_map(|entry| {
            let name = operator_name(entry.operator)?;
            let value = match &entry.value {
                CriteriaValue::None => Value::Null,
                CriteriaValue::Scalar(v) => v.clone(),
                CriteriaValue::List(items) => Value::Array(items.clone()),
                CriteriaValue::Pair(..) => return None,
            };
            Some((entry, name, value))
        })
        .enumerate()
        .map(|(id, (entry, name, value))| {
            json!({ "id": id, "field": entry.key, "operator": name, "value": value })
        })
        .collect();

    let quick: Vec<&String> = descriptor
        .search
        .as_ref()
        .map(|s| s.terms.iter().collect())
        .unwrap_or_default();
    if !items.is_empty() || !quick.is_empty() {
        let mut model = json!({ "items": items, "logicOperator": "and" });
        if !quick.is_empty() {
            model["quickFilterValues"] = json!(quick);
        }
        params.insert("filterModel".into(), model.to_string());
    }

    if !descriptor.sort.is_empty() {
        let sort: Vec<Value> = descriptor
            .sort
            .iter()
            .map(|s| json!({ "field": s.field, "sort": s.direction.as_str() }))
            .collect();
        params.insert("sortModel".into(), Value::Array(sort).to_string());
    }
    params
}
