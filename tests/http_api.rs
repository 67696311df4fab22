//! HTTP surface tests
//!
//! Drives the axum router with in-process requests against the fixture
//! schemas and an in-memory row source.

mod common;

use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use criteria_sql::query::QueryConfig;
use criteria_sql::rest_api::{router, AppState, RowSource};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Serves `total` numbered rows, honouring LIMIT/OFFSET from the SQL
struct NumberedRows {
    total: u64,
    executed: Mutex<Vec<(String, Vec<Value>)>>,
}

impl NumberedRows {
    fn new(total: u64) -> Self {
        Self {
            total,
            executed: Mutex::new(Vec::new()),
        }
    }

    fn window(sql: &str) -> (u64, u64) {
        let tail: Vec<u64> = sql
            .rsplit(' ')
            .take(3)
            .filter_map(|word| word.parse().ok())
            .collect();
        // "... LIMIT n OFFSET m" read backwards
        (tail[1], tail[0])
    }
}

impl RowSource for NumberedRows {
    async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, String> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        let (limit, offset) = Self::window(sql);
        let end = (offset + limit).min(self.total);
        Ok((offset..end).map(|id| json!({ "id": id + 1 })).collect())
    }

    async fn count(&self, sql: &str, params: &[Value]) -> Result<u64, String> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.total)
    }
}

fn app(total: u64, config: QueryConfig) -> (Router, Arc<NumberedRows>) {
    let state = AppState::new(Arc::new(common::loader()), config, NumberedRows::new(total));
    let rows = Arc::clone(&state.rows);
    (router(state), rows)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =============================================================================
// RESPONSE SHAPES
// =============================================================================

#[tokio::test]
async fn test_ag_grid_window() {
    let (app, rows) = app(45, QueryConfig::default());
    let (status, body) = get(app, "/api/Movies?startRow=40&endRow=60").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rowCount"], 45);
    assert_eq!(body["lastRow"], 45);
    assert_eq!(body["rowData"].as_array().unwrap().len(), 5);

    let executed = rows.executed.lock().unwrap();
    assert!(executed[0].0.ends_with("LIMIT 20 OFFSET 40"));
}

#[tokio::test]
async fn test_mui_page() {
    let (app, _) = app(45, QueryConfig::default());
    let (status, body) = get(app, "/api/Users?page=0&pageSize=10").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rowCount"], 45);
    assert_eq!(body["rows"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_simple_page_reports_rejections() {
    let (app, rows) = app(45, QueryConfig::default());
    let (status, body) = get(app, "/api/Movies?status=active&page=2&limit=10&sort=nme").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 45);
    assert_eq!(body["page"], 2);
    assert_eq!(body["per_page"], 10);
    assert_eq!(body["data"][0]["id"], 11);
    assert_eq!(body["rejected_filters"][0]["key"], "nme");
    assert_eq!(body["rejected_filters"][0]["reason"], "sort_field_invalid");
    assert_eq!(body["rejected_filters"][0]["suggestions"][0], "name");

    let executed = rows.executed.lock().unwrap();
    assert_eq!(executed[0].1.last(), Some(&json!("active")));
    assert_eq!(executed[1].1, vec![json!("active")]);
}

#[tokio::test]
async fn test_advanced_links_follow_the_request() {
    let (app, _) = app(45, QueryConfig::default());
    let (status, body) = get(
        app,
        "/api/Movies?per_page=20&page=2&sort=year:desc&filter%5Brating%5D%5Bgte%5D=7.5",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let meta = &body["meta"]["pagination"];
    assert_eq!(meta["total_pages"], 3);
    assert_eq!(meta["hasNextPage"], true);
    assert_eq!(meta["hasPreviousPage"], true);
    assert_eq!(
        body["links"]["next"],
        "/api/Movies?filter%5Brating%5D%5Bgte%5D=7.5&page=3&per_page=20&sort=year%3Adesc"
    );
    assert_eq!(
        body["links"]["prev"],
        "/api/Movies?filter%5Brating%5D%5Bgte%5D=7.5&page=1&per_page=20&sort=year%3Adesc"
    );
}

#[tokio::test]
async fn test_relationship_filter_over_http() {
    let (app, rows) = app(3, QueryConfig::default());
    let (status, body) = get(
        app,
        "/api/Movie_Quotes?filter%5Bmovies_movie_quotes.movies.deleted_at%5D%5BisNull%5D=",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    let executed = rows.executed.lock().unwrap();
    assert!(executed[0].0.contains("WHERE movies_rel_0.deleted_at IS NULL"));
    assert!(executed[1].0.contains("LEFT JOIN movies AS movies_rel_0"));
}

// =============================================================================
// ERRORS
// =============================================================================

#[tokio::test]
async fn test_model_path_is_exact_case() {
    let (app, _) = app(0, QueryConfig::default());
    let (status, body) = get(app, "/api/movie_quotes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SCHEMA_NOT_FOUND");
}

#[tokio::test]
async fn test_strict_mode_lists_every_problem() {
    let (app, rows) = app(0, QueryConfig::default().strict());
    let (status, body) = get(
        app,
        "/api/Users?filter%5Bpassword%5D%5Bequals%5D=x&filter%5Bage%5D%5Bgte%5D=old&sort=passwd",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    let reasons: Vec<&str> = body["rejected_filters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["reason"].as_str().unwrap())
        .collect();
    assert_eq!(
        reasons,
        vec!["value_shape_invalid", "operator_not_supported", "sort_field_invalid"]
    );
    assert!(rows.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_sql_endpoint_explains_the_plan() {
    let (app, rows) = app(0, QueryConfig::default());
    let (status, body) = get(
        app,
        "/api/Users/sql?filter%5Busers_roles.Roles.name%5D%5Bin%5D=admin,editor",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["format"], "structured");
    assert_eq!(body["query"]["distinct"], true);
    let joins = body["query"]["joins"].as_array().unwrap();
    assert_eq!(joins.len(), 2);
    assert_eq!(joins[1]["alias"], "roles_rel_0");
    assert_eq!(body["query"]["params"], json!(["admin", "editor"]));
    assert!(rows.executed.lock().unwrap().is_empty());
}
