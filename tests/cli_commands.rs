//! CLI command tests against the on-disk fixture schemas

mod common;

use std::fs;

use criteria_sql::cli::{check_schemas, compile, explain, parse_query_string, CliErrorCode, QueryArgs};
use serde_json::json;
use tempfile::TempDir;

fn args(model: &str, query: &str) -> QueryArgs {
    QueryArgs {
        schemas: common::schema_dir(),
        model: model.to_string(),
        query: query.to_string(),
        config: None,
    }
}

#[test]
fn test_check_schemas_lists_every_bundle() {
    let out = check_schemas(&common::schema_dir()).unwrap();
    let names: Vec<&str> = out["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Movie_Quotes", "Movies", "Roles", "Users"]);
    assert_eq!(out["relationship_count"], 3);
}

#[test]
fn test_check_schemas_rejects_dangling_references() {
    let dir = TempDir::new().unwrap();
    let bundle = json!({
        "models": [{
            "name": "Posts",
            "table": "posts",
            "fields": [
                { "name": "id", "type": "id" },
                { "name": "author", "type": "related_record", "related_model": "Authors" }
            ]
        }]
    });
    fs::write(dir.path().join("posts.json"), bundle.to_string()).unwrap();

    let err = check_schemas(dir.path()).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::SchemaError);
    assert!(err.message().contains("Authors"));
}

#[test]
fn test_compile_query_string() {
    let out = compile(&args(
        "Movie_Quotes",
        "?filter[movies_movie_quotes.movies.deleted_at][isNull]=&sort=-character",
    ))
    .unwrap();

    assert_eq!(out["format"], "structured");
    let sql = out["sql"].as_str().unwrap();
    assert!(sql.contains("WHERE movies_rel_0.deleted_at IS NULL"));
    assert!(sql.contains("ORDER BY movie_quotes.character DESC, movie_quotes.id ASC"));
    assert_eq!(out["count_params"], json!([]));
}

#[test]
fn test_explain_reports_rejections() {
    let out = explain(&args("Users", "password=x&avatar=null")).unwrap();

    assert_eq!(out["rejected_filters"][0]["key"], "password");
    assert_eq!(out["plan"]["where_clauses"], json!(["users.avatar IS NULL"]));
    assert_eq!(out["descriptor"]["format"], "simple");
}

#[test]
fn test_config_file_changes_separator() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("query.json");
    fs::write(&config, r#"{"display_name_separator": ", "}"#).unwrap();

    let mut a = args("Movies", "");
    a.config = Some(config);
    let out = compile(&a).unwrap();
    assert_eq!(out["params"], json!([", "]));
}

#[test]
fn test_bad_config_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("query.json");
    fs::write(&config, r#"{"max_page_size": 0}"#).unwrap();

    let mut a = args("Movies", "");
    a.config = Some(config);
    assert_eq!(compile(&a).unwrap_err().code(), &CliErrorCode::ConfigError);
}

#[test]
fn test_query_string_decoding() {
    let params = parse_query_string("search=%22de%20la%22+cruz&filter[name][contains]=a&b").unwrap();
    assert_eq!(params.get("search").map(String::as_str), Some("\"de la\" cruz"));
    // A bare `&` separates parameters
    assert_eq!(params.get("filter[name][contains]").map(String::as_str), Some("a"));
    assert_eq!(params.get("b").map(String::as_str), Some(""));
}
