//! Flat `field=value` requests, the fallback shape
//!
//! `null` and `!null` are null checks, a comma makes an IN list, anything
//! else is equality. `page` is 1-based, `sort` takes `field` or `-field`.

use super::bracket::dash_sort;
use super::{criterion_to_text, page_number, page_size, parse_sort_list, split_list, ParsedRequest, RawParams};
use crate::query::config::QueryConfig;
use crate::query::descriptor::{
    CriteriaEntry, CriteriaValue, Pagination, QueryDescriptor, ResponseFormat, SearchSpec,
};
use crate::query::operators::{Operator, ValueShape};
use crate::schema::ModelSchema;

const RESERVED: &[&str] = &["page", "limit", "sort", "search"];

pub(super) fn parse(params: &RawParams, schema: &ModelSchema, config: &QueryConfig) -> ParsedRequest {
    let size = page_size(params.get("limit"), config);
    let mut parsed = ParsedRequest::new(
        QueryDescriptor::new(&schema.name, size)
            .with_pagination(Pagination::from_page(page_number(params.get("page")), size))
            .with_format(ResponseFormat::Simple),
    );

    for (key, raw) in params {
        if RESERVED.contains(&key.as_str()) || key.starts_with('_') {
            continue;
        }
        parsed.descriptor.criteria.push(criterion_for(key, raw));
    }

    if let Some(raw) = params.get("sort") {
        parsed.descriptor.sort = parse_sort_list(raw);
    }
    parsed.descriptor.search = params
        .get("search")
        .and_then(|raw| SearchSpec::parse(raw, Vec::new()));
    parsed
}

fn criterion_for(key: &str, raw: &str) -> CriteriaEntry {
    match raw.trim() {
        "null" => CriteriaEntry::is_null(key),
        "!null" => CriteriaEntry::is_not_null(key),
        value if value.contains(',') => {
            CriteriaEntry::new(key, Operator::In, CriteriaValue::List(split_list(value)))
        }
        value => CriteriaEntry::equals(key, value.into()),
    }
}

pub(super) fn encode(descriptor: &QueryDescriptor) -> RawParams {
    let mut params = RawParams::new();
    for entry in &descriptor.criteria {
        let (key, value) = match (entry.operator, &entry.value) {
            (Operator::IsNull, _) => (entry.key.clone(), "null".to_string()),
            (Operator::IsNotNull, _) => (entry.key.clone(), "!null".to_string()),
            (Operator::Equals, CriteriaValue::Scalar(_)) | (Operator::In, CriteriaValue::List(_))
                if encodes_flat(entry) =>
            {
                (entry.key.clone(), criterion_to_text(&entry.value))
            }
            // No flat spelling; the bracket form still parses
            (op, value) => {
                let text = match op.value_shape() {
                    ValueShape::Nothing => String::new(),
                    _ => criterion_to_text(value),
                };
                (format!("filter[{}][{}]", entry.key, op), text)
            }
        };
        params.insert(key, value);
    }
    params.insert("page".into(), descriptor.pagination.page().to_string());
    params.insert("limit".into(), descriptor.pagination.limit.to_string());
    if !descriptor.sort.is_empty() {
        params.insert("sort".into(), dash_sort(&descriptor.sort));
    }
    if let Some(search) = &descriptor.search {
        params.insert("search".into(), search.to_input());
    }
    params
}

/// True when the flat text parses back to the same criterion
fn encodes_flat(entry: &CriteriaEntry) -> bool {
    if RESERVED.contains(&entry.key.as_str()) || entry.key.starts_with('_') {
        return false;
    }
    let text = criterion_to_text(&entry.value);
    let reparsed = criterion_for(&entry.key, &text);
    reparsed.operator == entry.operator
        && reparsed.value.values().len() == entry.value.values().len()
        && text.trim() == text
}
