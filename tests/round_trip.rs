//! Round-trip and determinism tests
//!
//! A validated descriptor rendered back into its own request format must
//! parse and validate to the same descriptor. Compiling the same request
//! twice must give the same SQL, and the count query must describe the same
//! row set as the page query.

mod common;

use criteria_sql::query::{
    build_query, compile, encode_request, CriteriaEntry, CriteriaValue, Operator, Pagination,
    QueryConfig, QueryDescriptor, ResponseFormat, SearchSpec, SortSpec, ValidatedQuery, Validator,
};
use criteria_sql::schema::SchemaRegistry;
use serde_json::json;

use common::{build, loader, params};

/// Encode the validated descriptor and run it through the pipeline again
fn assert_round_trips(model: &str, pairs: &[(&str, &str)], format: ResponseFormat) -> ValidatedQuery {
    let loader = loader();
    let schema = loader.model_schema(model).unwrap();
    let config = QueryConfig::default();

    let first = build_query(&params(pairs), schema, &loader, &config).unwrap();
    assert!(first.rejected.is_empty(), "{:?}", first.rejected);
    assert_eq!(first.descriptor.format, format);

    let encoded = encode_request(&first.descriptor);
    let second = build_query(&encoded, schema, &loader, &config).unwrap();
    assert!(second.rejected.is_empty(), "{:?}", second.rejected);
    assert_eq!(second.descriptor, first.descriptor, "re-encoded as {:?}", encoded);

    let sql_first = compile(&first.descriptor, &loader, &config).unwrap();
    let sql_second = compile(&second.descriptor, &loader, &config).unwrap();
    assert_eq!(sql_first.sql, sql_second.sql);
    assert_eq!(sql_first.params, sql_second.params);
    first
}

// =============================================================================
// REFERENCE REQUESTS
// =============================================================================

#[test]
fn test_simple_reference_request() {
    let validated = assert_round_trips(
        "Movies",
        &[("status", "active"), ("page", "2"), ("limit", "10"), ("sort", "name")],
        ResponseFormat::Simple,
    );

    let expected = QueryDescriptor::new("Movies", 10)
        .with_format(ResponseFormat::Simple)
        .with_pagination(Pagination::from_page(2, 10))
        .with_criterion(CriteriaEntry::equals("status", json!("active")))
        .with_sort(SortSpec::asc("name"));
    assert_eq!(validated.descriptor, expected);
}

#[test]
fn test_structured_range_is_two_criteria() {
    let validated = assert_round_trips(
        "Users",
        &[("filter[age][gte]", "18"), ("filter[age][lte]", "65")],
        ResponseFormat::Structured,
    );

    let expected = QueryDescriptor::new("Users", 20)
        .with_format(ResponseFormat::Structured)
        .with_criterion(CriteriaEntry::new("age", Operator::Gte, CriteriaValue::Scalar(json!(18))))
        .with_criterion(CriteriaEntry::new("age", Operator::Lte, CriteriaValue::Scalar(json!(65))));
    assert_eq!(validated.descriptor, expected);

    let (_, compiled) = build("Users", &[("filter[age][gte]", "18"), ("filter[age][lte]", "65")]);
    assert_eq!(compiled.where_clauses, vec!["users.age >= ?", "users.age <= ?"]);
    assert_eq!(compiled.count_params, vec![json!(18), json!(65)]);
}

#[test]
fn test_related_model_null_check() {
    let loader = loader();
    let config = QueryConfig::default();
    let criteria = json!({ "movies_movie_quotes.movies.deleted_at": null });
    let descriptor = QueryDescriptor::new("Movie_Quotes", 20)
        .with_criteria_map(criteria.as_object().unwrap().clone());

    let validated = Validator::new(&loader, &config)
        .validate(descriptor, Vec::new())
        .unwrap();
    assert_eq!(
        validated.descriptor.criteria,
        vec![CriteriaEntry::is_null("movies_movie_quotes.Movies.deleted_at")]
    );

    let compiled = compile(&validated.descriptor, &loader, &config).unwrap();
    let filter_joins: Vec<String> = compiled
        .joins
        .iter()
        .filter(|j| !j.is_projection_only())
        .map(|j| j.to_string())
        .collect();
    assert_eq!(
        filter_joins,
        vec![
            "LEFT JOIN rel_movies_movie_quotes AS rel_movies_movie_quotes_rel_0 \
             ON rel_movies_movie_quotes_rel_0.movie_quotes_id = movie_quotes.id",
            "LEFT JOIN movies AS movies_rel_0 \
             ON movies_rel_0.id = rel_movies_movie_quotes_rel_0.movies_id",
        ]
    );
    assert_eq!(compiled.where_clauses, vec!["movies_rel_0.deleted_at IS NULL"]);
    assert!(compiled.sql.contains(" WHERE movies_rel_0.deleted_at IS NULL ORDER BY"));
    assert_eq!(compiled.count_sql.matches("LEFT JOIN").count(), 2);
}

// =============================================================================
// EVERY FORMAT
// =============================================================================

#[test]
fn test_ag_grid_round_trip() {
    let filter_model = json!({
        "year": { "filterType": "number", "type": "inRange", "filter": 1980, "filterTo": 1989 },
        "name": { "filterType": "text", "type": "contains", "filter": "alien" },
        "genres": { "filterType": "set", "values": ["horror", "sci-fi"] },
    })
    .to_string();
    let sort_model = json!([{ "colId": "rating", "sort": "desc" }]).to_string();

    let validated = assert_round_trips(
        "Movies",
        &[
            ("startRow", "20"),
            ("endRow", "40"),
            ("filterModel", filter_model.as_str()),
            ("sortModel", sort_model.as_str()),
        ],
        ResponseFormat::AgGrid,
    );

    assert_eq!(validated.descriptor.pagination, Pagination { offset: 20, limit: 20 });
    assert_eq!(validated.descriptor.sort, vec![SortSpec::desc("rating")]);
    let ops: Vec<Operator> = validated.descriptor.criteria.iter().map(|c| c.operator).collect();
    assert_eq!(ops, vec![Operator::In, Operator::Contains, Operator::Between]);
}

#[test]
fn test_mui_round_trip() {
    let filter_model = json!({
        "items": [
            { "id": 1, "field": "status", "operator": "isAnyOf", "value": ["active", "invited"] },
            { "id": 2, "field": "age", "operator": ">=", "value": "21" },
            { "id": 3, "field": "email", "operator": "endsWith", "value": "" },
        ],
        "logicOperator": "and",
        "quickFilterValues": ["ann"],
    })
    .to_string();
    let sort_model = json!([{ "field": "last_name", "sort": "asc" }]).to_string();

    let validated = assert_round_trips(
        "Users",
        &[
            ("page", "1"),
            ("pageSize", "25"),
            ("filterModel", filter_model.as_str()),
            ("sortModel", sort_model.as_str()),
        ],
        ResponseFormat::MuiDataGrid,
    );

    let d = &validated.descriptor;
    assert_eq!(d.pagination, Pagination { offset: 25, limit: 25 });
    assert_eq!(d.criteria.len(), 2, "the empty item is still being typed");
    assert_eq!(
        d.criteria[1],
        CriteriaEntry::new("age", Operator::Gte, CriteriaValue::Scalar(json!(21)))
    );
    assert_eq!(
        d.search,
        Some(SearchSpec {
            terms: vec!["ann".to_string()],
            fields: vec!["first_name".to_string(), "last_name".to_string()],
        })
    );
}

#[test]
fn test_advanced_round_trip() {
    let validated = assert_round_trips(
        "Movie_Quotes",
        &[
            ("page", "3"),
            ("per_page", "15"),
            ("sort", "character:desc"),
            ("search", "\"game over\" man"),
            ("search_fields", "quote"),
            ("filter[movies_movie_quotes.Movies.year][between]", "1979,1986"),
        ],
        ResponseFormat::Advanced,
    );

    let d = &validated.descriptor;
    assert_eq!(d.pagination, Pagination::from_page(3, 15));
    assert_eq!(
        d.criteria[0],
        CriteriaEntry::new(
            "movies_movie_quotes.Movies.year",
            Operator::Between,
            CriteriaValue::Pair(json!(1979), json!(1986))
        )
    );
    assert_eq!(d.search.as_ref().unwrap().terms, vec!["game over", "man"]);
}

#[test]
fn test_simple_round_trip_with_lists_and_nulls() {
    assert_round_trips(
        "Movies",
        &[
            ("status", "active,archived"),
            ("deleted_at", "null"),
            ("poster", "!null"),
            ("search", "alien"),
            ("sort", "-year,name"),
        ],
        ResponseFormat::Simple,
    );
}

#[test]
fn test_structured_round_trip_with_relationship_keys() {
    assert_round_trips(
        "Users",
        &[
            ("filter[users_roles.is_primary]", "true"),
            ("filter[users_roles.Roles.name][in]", "admin,editor"),
            ("filter[created_at][gte]", "2024-01-01"),
            ("limit", "50"),
            ("sort", "-created_at"),
        ],
        ResponseFormat::Structured,
    );
}

// =============================================================================
// DETERMINISM
// =============================================================================

#[test]
fn test_identical_requests_compile_identically() {
    let pairs = [
        ("filter[users_roles.Roles.name][in]", "admin,editor"),
        ("filter[users_roles.is_primary]", "true"),
        ("search", "ann lee"),
        ("sort", "-age"),
    ];
    let (_, first) = build("Users", &pairs);
    for _ in 0..5 {
        let (_, again) = build("Users", &pairs);
        assert_eq!(again.sql, first.sql);
        assert_eq!(again.params, first.params);
        assert_eq!(again.count_sql, first.count_sql);
    }
}

#[test]
fn test_order_always_ends_with_primary_key() {
    let (_, unsorted) = build("Movies", &[]);
    assert_eq!(unsorted.order_by, vec!["movies.id ASC"]);

    let (_, sorted) = build("Movies", &[("sort", "-rating,name")]);
    assert_eq!(
        sorted.order_by,
        vec!["movies.rating DESC", "movies.name ASC", "movies.id ASC"]
    );

    let (_, by_id) = build("Movies", &[("sort", "-id")]);
    assert_eq!(by_id.order_by, vec!["movies.id DESC"]);
}

// =============================================================================
// PAGINATION BOUNDS
// =============================================================================

const HUGE: &str = "18446744073709551615";

#[test]
fn test_huge_page_numbers_clamp_in_every_format() {
    let cases: &[(&[(&str, &str)], ResponseFormat, u64)] = &[
        (&[("page", HUGE), ("limit", "1000")], ResponseFormat::Simple, 1000),
        (
            &[("filter[year][gte]", "1990"), ("page", HUGE), ("per_page", "20")],
            ResponseFormat::Advanced,
            20,
        ),
        (
            &[("filter[year][gte]", "1990"), ("page", HUGE), ("limit", "10")],
            ResponseFormat::Structured,
            10,
        ),
        (&[("page", HUGE), ("pageSize", "50")], ResponseFormat::MuiDataGrid, 50),
        (&[("startRow", HUGE), ("endRow", HUGE)], ResponseFormat::AgGrid, 20),
    ];

    for (pairs, format, limit) in cases {
        let (validated, compiled) = build("Movies", pairs);
        assert_eq!(validated.descriptor.format, *format);
        assert_eq!(compiled.limit, *limit, "{:?}", pairs);
        assert_eq!(compiled.offset, u64::MAX - limit, "{:?}", pairs);
        assert!(compiled
            .sql
            .ends_with(&format!("LIMIT {} OFFSET {}", limit, u64::MAX - limit)));
    }
}

#[test]
fn test_oversized_page_size_clamps_to_the_maximum() {
    let too_big = "99999999999999999999";
    let (_, simple) = build("Movies", &[("limit", too_big)]);
    assert!(simple.sql.ends_with("LIMIT 1000 OFFSET 0"), "{}", simple.sql);

    let (_, mui) = build("Movies", &[("page", "0"), ("pageSize", too_big)]);
    assert!(mui.sql.ends_with("LIMIT 1000 OFFSET 0"), "{}", mui.sql);

    let (_, ag_grid) = build("Movies", &[("startRow", "0"), ("endRow", too_big)]);
    assert!(ag_grid.sql.ends_with("LIMIT 1000 OFFSET 0"), "{}", ag_grid.sql);

    let config = QueryConfig {
        max_page_size: 200,
        ..QueryConfig::default()
    };
    let (_, capped) = common::build_with("Movies", &[("per_page", too_big)], &config);
    assert_eq!(capped.limit, 200);
}

// =============================================================================
// COUNT CONSISTENCY
// =============================================================================

#[test]
fn test_count_query_covers_every_page() {
    let filter = ("filter[movies_movie_quotes.Movie_Quotes.character]", "Ripley");
    let pages: Vec<_> = ["1", "2", "3"]
        .iter()
        .map(|page| build("Movies", &[filter, ("page", *page), ("limit", "10")]).1)
        .collect();

    for compiled in &pages {
        assert_eq!(compiled.count_sql, pages[0].count_sql);
        assert_eq!(compiled.count_params, pages[0].count_params);
        assert!(!compiled.count_sql.contains("LIMIT"));
        assert!(!compiled.count_sql.contains("ORDER BY"));
    }
    let offsets: Vec<u64> = pages.iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![0, 10, 20]);
}

#[test]
fn test_count_query_shares_joins_and_filters() {
    let cases: &[(&str, &[(&str, &str)])] = &[
        ("Movies", &[("year", "1979")]),
        ("Movies", &[("filter[movies_movie_quotes.Movie_Quotes.character]", "Ripley")]),
        (
            "Movie_Quotes",
            &[
                ("filter[quote_author.Users.status]", "active"),
                ("search", "bug hunt"),
            ],
        ),
        ("Users", &[("filter[users_roles.is_primary]", "true")]),
    ];

    for (model, pairs) in cases {
        let (_, compiled) = build(model, pairs);

        for join in compiled.joins.iter().filter(|j| !j.is_projection_only()) {
            assert!(compiled.count_sql.contains(&join.to_string()), "{}", compiled.count_sql);
        }
        for join in compiled.joins.iter().filter(|j| j.is_projection_only()) {
            assert!(!compiled.count_sql.contains(&join.alias), "{}", compiled.count_sql);
        }
        if !compiled.where_clauses.is_empty() {
            let where_sql = format!(" WHERE {}", compiled.where_clauses.join(" AND "));
            assert!(compiled.count_sql.ends_with(&where_sql));
            assert!(compiled.sql.contains(&where_sql));
        }

        // Page params are the projection separators followed by the count params
        let skipped = compiled.params.len() - compiled.count_params.len();
        assert_eq!(&compiled.params[skipped..], compiled.count_params.as_slice());
        assert_eq!(compiled.distinct, compiled.count_sql.contains("COUNT(DISTINCT"));
    }
}
