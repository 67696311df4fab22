//! # Request Parameter Parser
//!
//! Detects which request shape a raw parameter map uses and turns it into a
//! `QueryDescriptor`. Shapes are tried most specific first; the first parser
//! that recognises the map wins and Simple is the fallback:
//!
//! 1. AG-Grid server-side row model (`startRow`/`endRow`)
//! 2. MUI DataGrid (`filterModel` items, `sortModel`, `pageSize`)
//! 3. Advanced (`per_page`, `search_fields`, `sort=field:dir`)
//! 4. Structured (`filter[field][op]=value`)
//! 5. Simple (`field=value`, `page`, `limit`, `sort`)
//!
//! A parser never fails once it owns the request: fragments it cannot read
//! become `RejectedFilter`s next to the descriptor.
//!
//! Every shape also has an encoder, so a descriptor can be rendered back
//! into the parameters of its own format (used for pagination links).

mod ag_grid;
mod bracket;
mod mui;
mod simple;

use std::collections::BTreeMap;
use std::num::IntErrorKind;

use serde_json::Value;

use super::coerce::display;
use super::config::QueryConfig;
use super::descriptor::{
    CriteriaEntry, CriteriaValue, QueryDescriptor, ResponseFormat, SortDirection, SortSpec,
};
use super::errors::{RejectedFilter, RejectionReason};
use super::operators::{Operator, ValueShape};
use crate::observability::Event;
use crate::schema::ModelSchema;

/// Raw request parameters, one value per key
pub type RawParams = BTreeMap<String, String>;

/// Parser output: the descriptor plus whatever could not be read
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub descriptor: QueryDescriptor,
    pub rejected: Vec<RejectedFilter>,
}

impl ParsedRequest {
    fn new(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            rejected: Vec::new(),
        }
    }

    fn reject(&mut self, rejected: RejectedFilter) {
        self.rejected.push(rejected);
    }
}

/// One format parser: `None` means "not my format"
type FormatParser = fn(&RawParams, &ModelSchema, &QueryConfig) -> Option<ParsedRequest>;

/// Parsers in detection priority order
const PARSERS: &[FormatParser] = &[
    ag_grid::parse,
    mui::parse,
    bracket::parse_advanced,
    bracket::parse_structured,
];

/// Detect the request shape and parse it
pub fn parse_request(params: &RawParams, schema: &ModelSchema, config: &QueryConfig) -> ParsedRequest {
    let parsed = PARSERS
        .iter()
        .find_map(|parser| parser(params, schema, config))
        .unwrap_or_else(|| simple::parse(params, schema, config));

    Event::RequestParsed.emit(&[
        ("criteria", &parsed.descriptor.criteria.len().to_string()),
        ("format", parsed.descriptor.format.as_str()),
        ("model", &schema.name),
        ("rejected", &parsed.rejected.len().to_string()),
    ]);
    parsed
}

/// Render a descriptor back into raw parameters of its own format
pub fn encode_request(descriptor: &QueryDescriptor) -> RawParams {
    match descriptor.format {
        ResponseFormat::AgGrid => ag_grid::encode(descriptor),
        ResponseFormat::MuiDataGrid => mui::encode(descriptor),
        ResponseFormat::Advanced => bracket::encode_advanced(descriptor),
        ResponseFormat::Structured => bracket::encode_structured(descriptor),
        ResponseFormat::Simple => simple::encode(descriptor),
    }
}

/// Render raw parameters as a URL query string (without the leading `?`)
pub fn to_query_string(params: &RawParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Build a criterion from a textual value, shaped for `op`
fn criterion_from_text(key: &str, op: Operator, raw: &str) -> Result<CriteriaEntry, RejectedFilter> {
    let value = match op.value_shape() {
        ValueShape::Nothing => CriteriaValue::None,
        ValueShape::Scalar => CriteriaValue::Scalar(Value::String(raw.to_string())),
        ValueShape::List => CriteriaValue::List(split_list(raw)),
        ValueShape::Pair => {
            let mut bounds = split_list(raw);
            if bounds.len() != 2 {
                return Err(RejectedFilter::value_shape_invalid(
                    key,
                    op,
                    format!("'{}' expects two comma-separated values, got '{}'", op, raw),
                ));
            }
            let high = bounds.remove(1);
            let low = bounds.remove(0);
            CriteriaValue::Pair(low, high)
        }
    };
    Ok(CriteriaEntry::new(key, op, value))
}

/// Textual form of a criterion value, inverse of `criterion_from_text`
fn criterion_to_text(value: &CriteriaValue) -> String {
    match value {
        CriteriaValue::None => String::new(),
        CriteriaValue::Scalar(v) => display(v),
        CriteriaValue::List(items) => items.iter().map(display).collect::<Vec<_>>().join(","),
        CriteriaValue::Pair(low, high) => format!("{},{}", display(low), display(high)),
    }
}

/// Comma-separated list, blanks dropped
fn split_list(raw: &str) -> Vec<Value> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect()
}

/// `name`, `-name`, `name:desc` (comma-separated)
fn parse_sort_list(raw: &str) -> Vec<SortSpec> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            if let Some(field) = item.strip_prefix('-') {
                return SortSpec::desc(field);
            }
            match item.split_once(':') {
                Some((field, dir)) => SortSpec {
                    field: field.to_string(),
                    direction: SortDirection::parse(dir).unwrap_or(SortDirection::Asc),
                },
                None => SortSpec::asc(item),
            }
        })
        .collect()
}

/// Non-negative integer; digits past `u64::MAX` saturate
fn saturating_u64(raw: &str) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(u64::MAX),
        Err(_) => None,
    }
}

/// 1-based page number; anything unusable is page 1
fn page_number(raw: Option<&String>) -> u64 {
    raw.and_then(|p| saturating_u64(p))
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

/// Page size clamped into `1..=max_page_size`; unparseable means default
fn page_size(raw: Option<&String>, config: &QueryConfig) -> u64 {
    let Some(raw) = raw.map(|s| s.trim()) else {
        return config.default_page_size;
    };
    if let Some(size) = saturating_u64(raw) {
        return config.clamp_page_size(size);
    }
    match raw.strip_prefix('-') {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            config.clamp_page_size(0)
        }
        _ => config.default_page_size,
    }
}

/// JSON-encoded parameter, `None` when absent
fn json_param(params: &RawParams, key: &str) -> Option<Result<Value, RejectedFilter>> {
    params.get(key).map(|raw| {
        serde_json::from_str(raw).map_err(|e| {
            RejectedFilter::new(
                key,
                RejectionReason::Unparseable,
                format!("'{}' is not valid JSON: {}", key, e),
            )
        })
    })
}
