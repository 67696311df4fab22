//! # Query Core
//!
//! Raw request parameters in, parameterised SQL out:
//!
//! ```text
//! RawParams -> parser -> QueryDescriptor -> validator -> classifier
//!           -> JoinPlanner -> compiler -> CompiledQuery
//! ```
//!
//! Everything here is synchronous and holds no state between builds.

pub mod classifier;
pub mod coerce;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod errors;
pub mod joins;
pub mod operators;
pub mod parser;
pub mod validator;

#[cfg(test)]
pub(crate) mod fixtures;

pub use classifier::{classify, ClassifiedCriteria, FieldCriterion};
pub use compiler::{compile, CompiledQuery, QueryExplain};
pub use config::QueryConfig;
pub use descriptor::{
    CriteriaEntry, CriteriaValue, Pagination, QueryDescriptor, ResponseFormat, SearchSpec,
    SortDirection, SortSpec,
};
pub use errors::{QueryError, QueryResult, RejectedFilter, RejectionReason};
pub use joins::{JoinKey, JoinPlanEntry, JoinPlanner};
pub use operators::{supported_operators, Operator};
pub use parser::{encode_request, parse_request, to_query_string, ParsedRequest, RawParams};
pub use validator::{ValidatedQuery, Validator};

use crate::observability::ObservationScope;
use crate::schema::{ModelSchema, SchemaRegistry};

/// Parse and validate one request against `schema`
pub fn build_query(
    params: &RawParams,
    schema: &ModelSchema,
    registry: &dyn SchemaRegistry,
    config: &QueryConfig,
) -> QueryResult<ValidatedQuery> {
    let scope = ObservationScope::begin("QUERY_BUILD", &[("model", &schema.name)]);

    let parsed = parse_request(params, schema, config);
    match Validator::new(registry, config).validate(parsed.descriptor, parsed.rejected) {
        Ok(validated) => {
            scope.complete(&[
                ("criteria", &validated.descriptor.criteria.len().to_string()),
                ("rejected", &validated.rejected.len().to_string()),
            ]);
            Ok(validated)
        }
        Err(e) => {
            scope.fail(e.code());
            Err(e)
        }
    }
}

/// Parse, validate and compile in one step
pub fn build_and_compile(
    params: &RawParams,
    schema: &ModelSchema,
    registry: &dyn SchemaRegistry,
    config: &QueryConfig,
) -> QueryResult<(ValidatedQuery, CompiledQuery)> {
    let validated = build_query(params, schema, registry, config)?;
    let compiled = compile(&validated.descriptor, registry, config)?;
    Ok((validated, compiled))
}
