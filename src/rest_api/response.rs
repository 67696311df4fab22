//! # Response Formatting
//!
//! Reshapes a page of rows into the body the requesting grid expects. The
//! shape follows the request format the parser detected.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::query::{
    encode_request, to_query_string, Pagination, QueryDescriptor, RejectedFilter, ResponseFormat,
};

/// Where a page sits in the full result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationResult {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    /// Rows in this page
    pub returned: u64,
    /// 1-based
    pub page: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationResult {
    pub fn new(total: u64, offset: u64, limit: u64, returned: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            total,
            offset,
            limit,
            returned,
            page: Pagination { offset, limit }.page(),
            total_pages,
            has_next: offset + returned < total,
            has_previous: offset > 0,
        }
    }

    /// True once this page reaches the end of the result set
    pub fn is_last_page(&self) -> bool {
        self.offset + self.returned >= self.total
    }
}

/// Build the response body for `descriptor.format`.
///
/// `path` is the request path, used for the advanced format's links.
pub fn format_rows(
    rows: Vec<Value>,
    pagination: &PaginationResult,
    descriptor: &QueryDescriptor,
    rejected: &[RejectedFilter],
    path: &str,
) -> Value {
    let mut body = match descriptor.format {
        ResponseFormat::AgGrid => {
            let last_row = if pagination.is_last_page() {
                pagination.total as i64
            } else {
                -1
            };
            json!({
                "rowData": rows,
                "rowCount": pagination.total,
                "lastRow": last_row,
            })
        }
        ResponseFormat::MuiDataGrid => json!({
            "rows": rows,
            "rowCount": pagination.total,
        }),
        ResponseFormat::Simple => json!({
            "data": rows,
            "total": pagination.total,
            "page": pagination.page,
            "per_page": pagination.limit,
        }),
        ResponseFormat::Advanced | ResponseFormat::Structured => json!({
            "data": rows,
            "meta": {
                "pagination": {
                    "total": pagination.total,
                    "page": pagination.page,
                    "per_page": pagination.limit,
                    "total_pages": pagination.total_pages,
                    "offset": pagination.offset,
                    "hasNextPage": pagination.has_next,
                    "hasPreviousPage": pagination.has_previous,
                }
            },
            "links": links(descriptor, pagination, path),
        }),
    };

    if !rejected.is_empty() {
        if let Value::Object(map) = &mut body {
            map.insert("rejected_filters".to_string(), json!(rejected));
        }
    }
    body
}

/// self/next/prev URLs in the request's own format
fn links(descriptor: &QueryDescriptor, pagination: &PaginationResult, path: &str) -> Value {
    let link = |offset: u64| {
        let mut page = descriptor.clone();
        page.pagination = Pagination {
            offset,
            limit: pagination.limit,
        };
        format!("{}?{}", path, to_query_string(&encode_request(&page)))
    };

    let mut links = Map::new();
    links.insert("self".into(), Value::String(link(pagination.offset)));
    links.insert(
        "next".into(),
        if pagination.has_next {
            Value::String(link(pagination.offset + pagination.limit))
        } else {
            Value::Null
        },
    );
    links.insert(
        "prev".into(),
        if pagination.has_previous {
            Value::String(link(pagination.offset.saturating_sub(pagination.limit)))
        } else {
            Value::Null
        },
    );
    Value::Object(links)
}
