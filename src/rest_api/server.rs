//! # REST API HTTP Server
//!
//! Axum router exposing the query core:
//!
//! - `GET /api/:model` runs the request against the `RowSource` and returns
//!   rows shaped for the detected request format
//! - `GET /api/:model/sql` returns the compiled query without running it

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::observability::Event;
use crate::query::{build_and_compile, QueryConfig, QueryError, RawParams};
use crate::schema::SchemaRegistry;

use super::errors::{RestError, RestResult};
use super::response::{format_rows, PaginationResult};

/// Database seam: executes compiled SQL with bound parameters
pub trait RowSource: Send + Sync + 'static {
    /// Run a SELECT and return rows as JSON objects
    fn fetch(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<Value>, String>> + Send;

    /// Run a COUNT query and return its single value
    fn count(&self, sql: &str, params: &[Value]) -> impl Future<Output = Result<u64, String>> + Send;
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl HttpConfig {
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind((self.host.as_str(), self.port)).await
    }
}

/// Shared server state
pub struct AppState<R: RowSource> {
    pub registry: Arc<dyn SchemaRegistry + Send + Sync>,
    pub config: Arc<QueryConfig>,
    pub rows: Arc<R>,
}

impl<R: RowSource> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R: RowSource> AppState<R> {
    pub fn new(registry: Arc<dyn SchemaRegistry + Send + Sync>, config: QueryConfig, rows: R) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            rows: Arc::new(rows),
        }
    }
}

/// Build the Axum router
pub fn router<R: RowSource>(state: AppState<R>) -> Router {
    Router::new()
        .route("/api/:model", get(list_handler::<R>))
        .route("/api/:model/sql", get(sql_handler::<R>))
        .with_state(state)
}

/// Serve `router` on an already bound listener until the task is dropped
pub async fn serve<R: RowSource>(state: AppState<R>, listener: TcpListener) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    Event::Serving.emit(&[("addr", &addr.to_string())]);
    axum::serve(listener, router(state)).await
}

fn report(model: &str, err: RestError) -> RestError {
    Event::QueryFailed.emit(&[("code", err.code()), ("model", model)]);
    err
}

/// List records handler
async fn list_handler<R: RowSource>(
    State(state): State<AppState<R>>,
    Path(model): Path<String>,
    Query(params): Query<RawParams>,
) -> RestResult<Json<Value>> {
    let (validated, compiled) = {
        let registry = state.registry.as_ref();
        let schema = registry
            .model_schema(&model)
            .map_err(|e| report(&model, QueryError::from(e).into()))?;
        build_and_compile(&params, schema, registry, &state.config)
            .map_err(|e| report(&model, e.into()))?
    };

    let rows = state
        .rows
        .fetch(&compiled.sql, &compiled.params)
        .await
        .map_err(|e| report(&model, RestError::Database(e)))?;
    let total = state
        .rows
        .count(&compiled.count_sql, &compiled.count_params)
        .await
        .map_err(|e| report(&model, RestError::Database(e)))?;

    let pagination = PaginationResult::new(
        total,
        compiled.offset,
        compiled.limit,
        rows.len() as u64,
    );
    let path = format!("/api/{}", model);
    Ok(Json(format_rows(
        rows,
        &pagination,
        &validated.descriptor,
        &validated.rejected,
        &path,
    )))
}

/// Compiled SQL handler
async fn sql_handler<R: RowSource>(
    State(state): State<AppState<R>>,
    Path(model): Path<String>,
    Query(params): Query<RawParams>,
) -> RestResult<Json<Value>> {
    let registry = state.registry.as_ref();
    let schema = registry
        .model_schema(&model)
        .map_err(|e| report(&model, QueryError::from(e).into()))?;
    let (validated, compiled) = build_and_compile(&params, schema, registry, &state.config)
        .map_err(|e| report(&model, e.into()))?;

    Ok(Json(json!({
        "format": validated.descriptor.format,
        "descriptor": validated.descriptor,
        "rejected_filters": validated.rejected,
        "query": compiled.explain(),
    })))
}
