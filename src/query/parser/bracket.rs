//! Bracket-notation formats
//!
//! Both read `filter[field][op]=value` (and `filter[field]=value` for
//! equality). Advanced adds 1-based `page` with `per_page`, `sort=field:dir`
//! and `search_fields`; Structured uses `page`, `limit` and `sort=-field`.

use super::{
    criterion_from_text, criterion_to_text, page_number, page_size, parse_sort_list,
    ParsedRequest, RawParams,
};
use crate::query::config::QueryConfig;
use crate::query::descriptor::{
    Pagination, QueryDescriptor, ResponseFormat, SearchSpec, SortDirection, SortSpec,
};
use crate::query::errors::{RejectedFilter, RejectionReason};
use crate::query::operators::{Operator, ValueShape};
use crate::schema::ModelSchema;

const FILTER_PREFIX: &str = "filter[";

const ADVANCED_RESERVED: &[&str] = &["page", "per_page", "sort", "search", "search_fields"];
const STRUCTURED_RESERVED: &[&str] = &["page", "limit", "sort", "search"];

fn is_advanced_request(params: &RawParams) -> bool {
    params.contains_key("per_page")
        || params.contains_key("search_fields")
        || params.get("sort").is_some_and(|s| s.contains(':'))
}

fn is_structured_request(params: &RawParams) -> bool {
    params.keys().any(|k| k.starts_with(FILTER_PREFIX))
}

pub(super) fn parse_advanced(
    params: &RawParams,
    schema: &ModelSchema,
    config: &QueryConfig,
) -> Option<ParsedRequest> {
    if !is_advanced_request(params) {
        return None;
    }
    let size = page_size(params.get("per_page"), config);
    let mut parsed = ParsedRequest::new(
        QueryDescriptor::new(&schema.name, size)
            .with_pagination(Pagination::from_page(page_number(params.get("page")), size))
            .with_format(ResponseFormat::Advanced),
    );

    let fields: Vec<String> = params
        .get("search_fields")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    parsed.descriptor.search = params
        .get("search")
        .and_then(|raw| SearchSpec::parse(raw, fields));

    read_filters(params, ADVANCED_RESERVED, &mut parsed);
    Some(parsed)
}

pub(super) fn parse_structured(
    params: &RawParams,
    schema: &ModelSchema,
    config: &QueryConfig,
) -> Option<ParsedRequest> {
    if !is_structured_request(params) {
        return None;
    }
    let size = page_size(params.get("limit"), config);
    let mut parsed = ParsedRequest::new(
        QueryDescriptor::new(&schema.name, size)
            .with_pagination(Pagination::from_page(page_number(params.get("page")), size))
            .with_format(ResponseFormat::Structured),
    );
    parsed.descriptor.search = params
        .get("search")
        .and_then(|raw| SearchSpec::parse(raw, Vec::new()));

    read_filters(params, STRUCTURED_RESERVED, &mut parsed);
    Some(parsed)
}

/// Filters, then sort, from a bracket-notation map
fn read_filters(params: &RawParams, reserved: &[&str], parsed: &mut ParsedRequest) {
    for (key, raw) in params {
        if reserved.contains(&key.as_str()) || key.starts_with('_') {
            continue;
        }
        let Some(path) = key.strip_prefix(FILTER_PREFIX) else {
            parsed.reject(RejectedFilter::new(
                key,
                RejectionReason::Unparseable,
                format!("unknown parameter '{}'; filters are written filter[{}]=value", key, key),
            ));
            continue;
        };
        match split_filter_key(path) {
            Some((field, None)) => push_criterion(parsed, &field, Operator::Equals, raw),
            Some((field, Some(name))) => match Operator::parse(&name) {
                Some(op) => push_criterion(parsed, &field, op, raw),
                None => parsed.reject(
                    RejectedFilter::new(
                        &field,
                        RejectionReason::Unparseable,
                        format!("unknown operator '{}'", name),
                    )
                    .with_operator(&name)
                    .with_suggestions(
                        Operator::ALL.iter().map(|op| op.as_str().to_string()).collect(),
                    ),
                ),
            },
            None => parsed.reject(RejectedFilter::new(
                key,
                RejectionReason::Unparseable,
                format!("malformed filter key '{}'", key),
            )),
        }
    }

    if let Some(raw) = params.get("sort") {
        parsed.descriptor.sort = parse_sort_list(raw);
    }
}

/// `field]` or `field][op]`, with the `filter[` prefix already removed
fn split_filter_key(path: &str) -> Option<(String, Option<String>)> {
    let (field, rest) = path.split_once(']')?;
    if field.is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some((field.to_string(), None));
    }
    let op = rest.strip_prefix('[')?.strip_suffix(']')?;
    if op.is_empty() || op.contains(['[', ']']) {
        return None;
    }
    Some((field.to_string(), Some(op.to_string())))
}

fn push_criterion(parsed: &mut ParsedRequest, field: &str, op: Operator, raw: &str) {
    match criterion_from_text(field, op, raw) {
        Ok(entry) => parsed.descriptor.criteria.push(entry),
        Err(rejected) => parsed.reject(rejected),
    }
}

fn encode_filters(descriptor: &QueryDescriptor, params: &mut RawParams) {
    for entry in &descriptor.criteria {
        let value = match entry.operator.value_shape() {
            ValueShape::Nothing => String::new(),
            _ => criterion_to_text(&entry.value),
        };
        params.insert(format!("filter[{}][{}]", entry.key, entry.operator), value);
    }
}

pub(super) fn encode_advanced(descriptor: &QueryDescriptor) -> RawParams {
    let mut params = RawParams::new();
    encode_filters(descriptor, &mut params);
    params.insert("page".into(), descriptor.pagination.page().to_string());
    params.insert("per_page".into(), descriptor.pagination.limit.to_string());
    if !descriptor.sort.is_empty() {
        let sort: Vec<String> = descriptor
            .sort
            .iter()
            .map(|s| format!("{}:{}", s.field, s.direction.as_str()))
            .collect();
        params.insert("sort".into(), sort.join(","));
    }
    if let Some(search) = &descriptor.search {
        params.insert("search".into(), search.to_input());
        if !search.fields.is_empty() {
            params.insert("search_fields".into(), search.fields.join(","));
        }
    }
    params
}

pub(super) fn encode_structured(descriptor: &QueryDescriptor) -> RawParams {
    let mut params = RawParams::new();
    encode_filters(descriptor, &mut params);
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

/// `name,-year`
pub(super) fn dash_sort(sort: &[SortSpec]) -> String {
    sort.iter()
        .map(|s| match s.direction {
            SortDirection::Asc => s.field.clone(),
            SortDirection::Desc => format!("-{}", s.field),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::super::tests::params;
    use super::*;
    use crate::query::descriptor::{CriteriaEntry, CriteriaValue};
    use crate::query::fixtures;
    use serde_json::json;

    #[test]
    fn test_structured_range() {
        let raw = params(&[
            ("filter[year][gte]", "1990"),
            ("filter[year][lte]", "1999"),
            ("limit", "10"),
            ("sort", "-year,name"),
        ]);
        let parsed = parse_structured(&raw, &fixtures::movies(), &QueryConfig::default()).unwrap();
        let d = &parsed.descriptor;

        assert!(parsed.rejected.is_empty());
        assert_eq!(d.criteria.len(), 2);
        assert_eq!(d.criteria[0].operator, Operator::Gte);
        assert_eq!(d.criteria[1].operator, Operator::Lte);
        assert_eq!(d.sort, vec![SortSpec::desc("year"), SortSpec::asc("name")]);
        assert_eq!(d.pagination, Pagination { offset: 0, limit: 10 });
    }

    #[test]
    fn test_bare_filter_is_equality() {
        let raw = params(&[("filter[name]", "Alien"), ("filter[deleted_at][isNull]", "")]);
        let parsed = parse_structured(&raw, &fixtures::movies(), &QueryConfig::default()).unwrap();
        assert_eq!(
            parsed.descriptor.criteria,
            vec![
                CriteriaEntry::is_null("deleted_at"),
                CriteriaEntry::equals("name", json!("Alien")),
            ]
        );
    }

    #[test]
    fn test_unknown_operator_and_malformed_key() {
        let raw = params(&[
            ("filter[name][fuzzy]", "x"),
            ("filter[year", "1"),
            ("filter[year][between]", "1990"),
        ]);
        let parsed = parse_structured(&raw, &fixtures::movies(), &QueryConfig::default()).unwrap();
        assert!(parsed.descriptor.criteria.is_empty());
        let reasons: Vec<RejectionReason> = parsed.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                RejectionReason::Unparseable,
                RejectionReason::Unparseable,
                RejectionReason::ValueShapeInvalid,
            ]
        );
    }

    #[test]
    fn test_advanced_page_and_search_fields() {
        let raw = params(&[
            ("page", "3"),
            ("per_page", "15"),
            ("search", "alien \"ridley scott\""),
            ("search_fields", "name, character"),
            ("sort", "rating:desc"),
            ("filter[genres][overlap]", "horror,scifi"),
        ]);
        let parsed = parse_advanced(&raw, &fixtures::movies(), &QueryConfig::default()).unwrap();
        let d = &parsed.descriptor;

        assert_eq!(d.pagination, Pagination { offset: 30, limit: 15 });
        let search = d.search.as_ref().unwrap();
        assert_eq!(search.terms, vec!["alien", "ridley scott"]);
        assert_eq!(search.fields, vec!["name", "character"]);
        assert_eq!(d.sort, vec![SortSpec::desc("rating")]);
        assert_eq!(
            d.criteria[0].value,
            CriteriaValue::List(vec![json!("horror"), json!("scifi")])
        );
    }

    #[test]
    fn test_advanced_needs_its_markers() {
        let raw = params(&[("filter[name]", "Alien"), ("sort", "-name")]);
        assert!(parse_advanced(&raw, &fixtures::movies(), &QueryConfig::default()).is_none());
    }

    #[test]
    fn test_encoders_round_trip() {
        let base = QueryDescriptor::new("Movies", 10)
            .with_pagination(Pagination::from_page(2, 10))
            .with_criterion(CriteriaEntry::new(
                "year",
                Operator::Between,
                CriteriaValue::Pair(json!("1990"), json!("1999")),
            ))
            .with_criterion(CriteriaEntry::is_null("deleted_at"))
            .with_sort(SortSpec::desc("year"));
        let schema = fixtures::movies();
        let config = QueryConfig::default();

        let advanced = base.clone().with_format(ResponseFormat::Advanced).with_search(
            SearchSpec::parse("alien", vec!["name".to_string()]).unwrap(),
        );
        let encoded = encode_advanced(&advanced);
        assert_eq!(encoded.get("sort").map(String::as_str), Some("year:desc"));
        let reparsed = parse_advanced(&encoded, &schema, &config).unwrap();
        // Parameters are keyed, so filters come back in key order
        let mut expected = advanced.clone();
        expected.criteria.reverse();
        assert_eq!(reparsed.descriptor, expected);

        let structured = base.with_format(ResponseFormat::Structured);
        let encoded = encode_structured(&structured);
        assert!(!encoded.contains_key("per_page"));
        assert_eq!(encoded.get("sort").map(String::as_str), Some("-year"));
        let reparsed = parse_structured(&encoded, &schema, &config).unwrap();
        let mut expected = structured.clone();
        expected.criteria.reverse();
        assert_eq!(reparsed.descriptor, expected);
    }
}
