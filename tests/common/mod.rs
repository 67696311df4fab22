//! Shared helpers for the integration tests
//!
//! Schemas come from `tests/fixtures/schemas`, loaded the same way the CLI
//! loads a schema directory.

#![allow(dead_code)]

use std::path::PathBuf;

use criteria_sql::query::{build_and_compile, CompiledQuery, QueryConfig, RawParams, ValidatedQuery};
use criteria_sql::schema::{SchemaLoader, SchemaRegistry};

pub fn schema_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/schemas")
}

/// Loader with every fixture bundle registered and verified
pub fn loader() -> SchemaLoader {
    let mut loader = SchemaLoader::new(&schema_dir());
    loader.load_all().expect("fixture schemas load");
    loader
}

pub fn params(pairs: &[(&str, &str)]) -> RawParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Parse, validate and compile `pairs` against `model` with default config
pub fn build(model: &str, pairs: &[(&str, &str)]) -> (ValidatedQuery, CompiledQuery) {
    build_with(model, pairs, &QueryConfig::default())
}

pub fn build_with(
    model: &str,
    pairs: &[(&str, &str)],
    config: &QueryConfig,
) -> (ValidatedQuery, CompiledQuery) {
    let loader = loader();
    let schema = loader.model_schema(model).expect("fixture model exists");
    build_and_compile(&params(pairs), schema, &loader, config).expect("query builds")
}
