//! Normalized query representation
//!
//! Every request shape is parsed into one `QueryDescriptor`; everything
//! downstream (validation, classification, compilation) works on it.

use serde::Serialize;
use serde_json::{Map, Value};

use super::operators::Operator;

/// Value meaning "any non-null value" in criteria maps
pub const NOT_NULL_SENTINEL: &str = "__not_null__";

/// Value carried by a criterion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CriteriaValue {
    /// Null checks carry nothing
    None,
    Scalar(Value),
    List(Vec<Value>),
    /// Inclusive (low, high) bounds
    Pair(Value, Value),
}

impl CriteriaValue {
    /// Scalar values as a flat list, for parameter binding
    pub fn values(&self) -> Vec<&Value> {
        match self {
            CriteriaValue::None => Vec::new(),
            CriteriaValue::Scalar(v) => vec![v],
            CriteriaValue::List(items) => items.iter().collect(),
            CriteriaValue::Pair(low, high) => vec![low, high],
        }
    }
}

/// One filter: dot-notation key, operator and value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaEntry {
    /// `field`, `relationship.field` or `relationship.Model.field`
    pub key: String,
    pub operator: Operator,
    pub value: CriteriaValue,
}

impl CriteriaEntry {
    pub fn new(key: impl Into<String>, operator: Operator, value: CriteriaValue) -> Self {
        Self {
            key: key.into(),
            operator,
            value,
        }
    }

    /// Create an equality criterion
    pub fn equals(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, Operator::Equals, CriteriaValue::Scalar(value))
    }

    /// Create a null check
    pub fn is_null(key: impl Into<String>) -> Self {
        Self::new(key, Operator::IsNull, CriteriaValue::None)
    }

    /// Create a not-null check
    pub fn is_not_null(key: impl Into<String>) -> Self {
        Self::new(key, Operator::IsNotNull, CriteriaValue::None)
    }

    /// Interpret a plain `key: value` pair.
    ///
    /// `null` becomes a null check, an array becomes an IN list and the
    /// not-null sentinel becomes a not-null check; anything else is equality.
    pub fn from_json(key: impl Into<String>, value: Value) -> Self {
        match value {
            Value::Null => Self::is_null(key),
            Value::Array(items) => Self::new(key, Operator::In, CriteriaValue::List(items)),
            Value::String(s) if s == NOT_NULL_SENTINEL => Self::is_not_null(key),
            other => Self::equals(key, other),
        }
    }

    /// Key split on `.`
    pub fn segments(&self) -> Vec<&str> {
        self.key.split('.').collect()
    }

    /// Number of dots in the key: 0 direct, 1 relationship, 2+ related model
    pub fn depth(&self) -> usize {
        self.key.matches('.').count()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Parse "asc"/"desc" in any case
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Asc),
            "desc" | "descending" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Window into the result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    /// Window at `offset`, pulled back so `offset + limit` fits in a u64
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset: offset.min(u64::MAX - limit),
            limit,
        }
    }

    /// 1-based page of `size` rows. Page 0 is treated as page 1.
    pub fn from_page(page: u64, size: u64) -> Self {
        Self::new((page.max(1) - 1).saturating_mul(size), size)
    }

    /// 1-based page containing `offset`
    pub fn page(&self) -> u64 {
        if self.limit == 0 {
            return 1;
        }
        self.offset / self.limit + 1
    }
}

/// Free-text search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSpec {
    /// Words and quoted phrases; every term must match some field
    pub terms: Vec<String>,
    /// Requested fields; empty means the model's defaults
    pub fields: Vec<String>,
}

impl SearchSpec {
    /// Tokenize raw input into terms. Returns `None` for blank input.
    pub fn parse(input: &str, fields: Vec<String>) -> Option<Self> {
        let terms = tokenize_search(input);
        if terms.is_empty() {
            return None;
        }
        Some(Self { terms, fields })
    }

    /// Raw input that tokenizes back to the same terms
    pub fn to_input(&self) -> String {
        self.terms
            .iter()
            .map(|t| {
                if t.chars().any(char::is_whitespace) {
                    format!("\"{}\"", t)
                } else {
                    t.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split on whitespace, keeping "quoted phrases" whole. Duplicates dropped.
pub fn tokenize_search(input: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                flush(&mut current, &mut terms);
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => flush(&mut current, &mut terms),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut terms);
    terms
}

fn flush(current: &mut String, terms: &mut Vec<String>) {
    let term = current.trim().to_string();
    if !term.is_empty() && !terms.contains(&term) {
        terms.push(term);
    }
    current.clear();
}

/// Request shapes, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    AgGrid,
    MuiDataGrid,
    Advanced,
    Structured,
    Simple,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::AgGrid => "ag_grid",
            ResponseFormat::MuiDataGrid => "mui_data_grid",
            ResponseFormat::Advanced => "advanced",
            ResponseFormat::Structured => "structured",
            ResponseFormat::Simple => "simple",
        }
    }
}

/// Normalized representation of one inbound request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    /// Primary model
    pub model: String,
    /// Filters, all combined with AND
    pub criteria: Vec<CriteriaEntry>,
    pub search: Option<SearchSpec>,
    /// Requested order; the primary key tie-break is added at compile time
    pub sort: Vec<SortSpec>,
    pub pagination: Pagination,
    pub format: ResponseFormat,
}

impl QueryDescriptor {
    /// Creates a descriptor for `model` with a first page of `page_size` rows
    pub fn new(model: impl Into<String>, page_size: u64) -> Self {
        Self {
            model: model.into(),
            criteria: Vec::new(),
            search: None,
            sort: Vec::new(),
            pagination: Pagination::from_page(1, page_size),
            format: ResponseFormat::Simple,
        }
    }

    pub fn with_criterion(mut self, entry: CriteriaEntry) -> Self {
        self.criteria.push(entry);
        self
    }

    /// Adds one criterion per map entry, interpreted by `CriteriaEntry::from_json`
    pub fn with_criteria_map(mut self, map: Map<String, Value>) -> Self {
        self.criteria
            .extend(map.into_iter().map(|(k, v)| CriteriaEntry::from_json(k, v)));
        self
    }

    pub fn with_search(mut self, search: SearchSpec) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_interpretation() {
        let null = CriteriaEntry::from_json("deleted_at", Value::Null);
        assert_eq!(null.operator, Operator::IsNull);
        assert_eq!(null.value, CriteriaValue::None);

        let list = CriteriaEntry::from_json("status", json!(["a", "b"]));
        assert_eq!(list.operator, Operator::In);

        let present = CriteriaEntry::from_json("email", json!(NOT_NULL_SENTINEL));
        assert_eq!(present.operator, Operator::IsNotNull);

        let eq = CriteriaEntry::from_json("name", json!("Alien"));
        assert_eq!(eq.operator, Operator::Equals);
        assert_eq!(eq.value, CriteriaValue::Scalar(json!("Alien")));
    }

    #[test]
    fn test_depth() {
        assert_eq!(CriteriaEntry::is_null("name").depth(), 0);
        assert_eq!(CriteriaEntry::is_null("roles.name").depth(), 1);
        assert_eq!(
            CriteriaEntry::is_null("movies_movie_quotes.Movies.deleted_at").depth(),
            2
        );
    }

    #[test]
    fn test_pagination_pages() {
        let p = Pagination::from_page(3, 25);
        assert_eq!(p.offset, 50);
        assert_eq!(p.page(), 3);
        assert_eq!(Pagination::from_page(0, 10).offset, 0);
    }

    #[test]
    fn test_pagination_saturates_on_huge_pages() {
        let p = Pagination::from_page(u64::MAX, 1000);
        assert_eq!(p.offset, u64::MAX - 1000);
        assert_eq!(p.limit, 1000);
        assert!(p.offset.checked_add(p.limit).is_some());
        assert_eq!(p.page(), (u64::MAX - 1000) / 1000 + 1);

        assert_eq!(Pagination::new(u64::MAX, 1).offset, u64::MAX - 1);
    }

    #[test]
    fn test_tokenize_words_and_phrases() {
        let terms = tokenize_search(r#"alien "ridley scott"  1979 alien"#);
        assert_eq!(terms, vec!["alien", "ridley scott", "1979"]);
        assert!(tokenize_search("   ").is_empty());
    }

    #[test]
    fn test_search_input_round_trip() {
        let search = SearchSpec::parse(r#"space "in space" scream"#, vec![]).unwrap();
        let again = SearchSpec::parse(&search.to_input(), vec![]).unwrap();
        assert_eq!(search, again);
    }

    #[test]
    fn test_criteria_value_serialization() {
        assert_eq!(serde_json::to_value(CriteriaValue::None).unwrap(), Value::Null);
        assert_eq!(
            serde_json::to_value(CriteriaValue::Pair(json!(1), json!(5))).unwrap(),
            json!([1, 5])
        );
    }
}
