//! CLI command implementations
//!
//! Each command loads the schema directory (and optional query config),
//! does its work synchronously and returns one JSON value for stdout.

use std::path::Path;

use axum::extract::Query;
use axum::http::Uri;
use serde_json::{json, Value};

use crate::observability::Event;
use crate::query::{build_and_compile, CompiledQuery, QueryConfig, QueryError, RawParams, ValidatedQuery};
use crate::schema::{SchemaLoader, SchemaRegistry};

use super::args::{Command, QueryArgs};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Run one parsed command and print its result
pub fn run_command(command: Command) -> CliResult<()> {
    let output = match command {
        Command::Compile(args) => compile(&args)?,
        Command::Explain(args) => explain(&args)?,
        Command::CheckSchemas { schemas } => check_schemas(&schemas)?,
    };
    write_response(output)
}

/// SQL, parameters and count query for one request
pub fn compile(args: &QueryArgs) -> CliResult<Value> {
    let (validated, compiled) = build(args)?;
    Ok(json!({
        "model": validated.descriptor.model,
        "format": validated.descriptor.format,
        "sql": compiled.sql,
        "params": compiled.params,
        "count_sql": compiled.count_sql,
        "count_params": compiled.count_params,
        "rejected_filters": validated.rejected,
    }))
}

/// Descriptor and JOIN plan for one request
pub fn explain(args: &QueryArgs) -> CliResult<Value> {
    let (validated, compiled) = build(args)?;
    Ok(json!({
        "descriptor": validated.descriptor,
        "rejected_filters": validated.rejected,
        "plan": compiled.explain(),
    }))
}

/// Load a schema directory and summarise it
pub fn check_schemas(dir: &Path) -> CliResult<Value> {
    let loader = load_schemas(dir)?;
    let mut models: Vec<Value> = loader
        .all_models()
        .into_iter()
        .map(|m| {
            json!({
                "name": m.name,
                "table": m.table,
                "fields": m.fields.len(),
                "relationships": m.relationships,
            })
        })
        .collect();
    models.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    Ok(json!({
        "models": models,
        "relationship_count": loader.relationship_count(),
    }))
}

fn build(args: &QueryArgs) -> CliResult<(ValidatedQuery, CompiledQuery)> {
    let loader = load_schemas(&args.schemas)?;
    let config = load_config(args.config.as_deref())?;
    let params = parse_query_string(&args.query)?;

    let schema = loader.model_schema(&args.model).map_err(QueryError::from)?;
    Ok(build_and_compile(&params, schema, &loader, &config)?)
}

fn load_schemas(dir: &Path) -> CliResult<SchemaLoader> {
    let mut loader = SchemaLoader::new(dir);
    loader.load_all()?;
    Event::SchemasLoaded.emit(&[
        ("dir", &dir.display().to_string()),
        ("models", &loader.model_count().to_string()),
        ("relationships", &loader.relationship_count().to_string()),
    ]);
    Ok(loader)
}

fn load_config(path: Option<&Path>) -> CliResult<QueryConfig> {
    let (config, source) = match path {
        Some(path) => (QueryConfig::load(path)?, path.display().to_string()),
        None => (QueryConfig::default(), "defaults".to_string()),
    };
    Event::ConfigLoaded.emit(&[
        ("max_page_size", &config.max_page_size.to_string()),
        ("source", &source),
        ("strict", if config.strict { "true" } else { "false" }),
    ]);
    Ok(config)
}

/// Decode `a=1&b=2` (optionally prefixed with `?`) into raw parameters
pub fn parse_query_string(raw: &str) -> CliResult<RawParams> {
    let mut query = String::new();
    for byte in raw.trim().trim_start_matches('?').bytes() {
        // Keep the separators and existing escapes, escape the rest for Uri
        if byte.is_ascii_alphanumeric() || b"-_.~=&%+,:!*'()/;@$".contains(&byte) {
            query.push(byte as char);
        } else {
            query.push_str(&format!("%{:02X}", byte));
        }
    }
    let uri: Uri = format!("/?{}", query)
        .parse()
        .map_err(|e| CliError::invalid_argument(format!("Invalid query string: {}", e)))?;
    let Query(params) = Query::<RawParams>::try_from_uri(&uri)
        .map_err(|e| CliError::invalid_argument(format!("Invalid query string: {}", e)))?;
    Ok(params)
}
