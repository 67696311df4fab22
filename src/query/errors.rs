//! # Query Errors
//!
//! Fatal errors abort the request. Per-criterion problems are collected as
//! `RejectedFilter`s and only become fatal in strict mode.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use super::operators::{describe_operators, Operator};
use crate::schema::{SchemaError, SchemaErrorCode};

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Why a filter, sort or search field was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Field does not exist on the resolved model
    FieldNotFound,
    /// Relationship segment is not attached to the model
    RelationshipNotFound,
    /// Model segment does not match the relationship's other model
    RelatedModelMismatch,
    /// Field exists but does not accept the operator
    OperatorNotSupported,
    /// Wrong arity or type for the operator
    ValueShapeInvalid,
    /// Sort on an unknown or unsortable field
    SortFieldInvalid,
    /// Search on an unknown or unsearchable field
    SearchFieldInvalid,
    /// Request fragment that could not be parsed
    Unparseable,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::FieldNotFound => "FIELD_NOT_FOUND",
            RejectionReason::RelationshipNotFound => "RELATIONSHIP_NOT_FOUND",
            RejectionReason::RelatedModelMismatch => "RELATED_MODEL_MISMATCH",
            RejectionReason::OperatorNotSupported => "OPERATOR_NOT_SUPPORTED",
            RejectionReason::ValueShapeInvalid => "VALUE_SHAPE_INVALID",
            RejectionReason::SortFieldInvalid => "SORT_FIELD_INVALID",
            RejectionReason::SearchFieldInvalid => "SEARCH_FIELD_INVALID",
            RejectionReason::Unparseable => "UNPARSEABLE",
        }
    }
}

/// One dropped request fragment, with hints for the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFilter {
    /// Key as the client sent it
    pub key: String,
    /// Operator as the client sent it, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub reason: RejectionReason,
    pub message: String,
    /// Valid operators or field names to try instead
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl RejectedFilter {
    pub fn new(key: impl Into<String>, reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: None,
            reason,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_operator(mut self, op: impl Into<String>) -> Self {
        self.operator = Some(op.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Unknown field, with nearby field names as suggestions
    pub fn field_not_found(key: &str, field: &str, model: &str, suggestions: Vec<String>) -> Self {
        Self::new(
            key,
            RejectionReason::FieldNotFound,
            format!("Field '{}' does not exist on model '{}'", field, model),
        )
        .with_suggestions(suggestions)
    }

    /// Field/operator mismatch, listing what the field accepts
    pub fn operator_not_supported(
        key: &str,
        op: Operator,
        field_type: &str,
        supported: &BTreeSet<Operator>,
    ) -> Self {
        Self::new(
            key,
            RejectionReason::OperatorNotSupported,
            format!(
                "Operator '{}' is not supported for {} field '{}'",
                op, field_type, key
            ),
        )
        .with_operator(op.as_str())
        .with_suggestions(describe_operators(supported))
    }

    /// Wrong value for the operator
    pub fn value_shape_invalid(key: &str, op: Operator, message: impl Into<String>) -> Self {
        Self::new(key, RejectionReason::ValueShapeInvalid, message).with_operator(op.as_str())
    }
}

/// Query core errors
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Unknown model (exact-case match)
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// Relationship missing from the metadata
    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    /// Metadata itself is inconsistent
    #[error("Schema error: {0}")]
    Schema(String),

    /// Strict mode: every rejected fragment, reported at once
    #[error("{} filter(s) rejected", .0.len())]
    ValidationFailed(Vec<RejectedFilter>),

    /// Nothing usable left and the caller required at least one criterion
    #[error("No usable criteria remain")]
    NoUsableCriteria(Vec<RejectedFilter>),

    /// An alias was requested that the planner never produced. Always a defect.
    #[error("JOIN planning defect: {0}")]
    JoinPlanning(String),

    /// Request could not be interpreted at all
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration file problem
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::SchemaNotFound(_) => "SCHEMA_NOT_FOUND",
            QueryError::RelationshipNotFound(_) => "RELATIONSHIP_NOT_FOUND",
            QueryError::Schema(_) => "SCHEMA_ERROR",
            QueryError::ValidationFailed(_) => "VALIDATION_FAILED",
            QueryError::NoUsableCriteria(_) => "NO_USABLE_CRITERIA",
            QueryError::JoinPlanning(_) => "JOIN_PLANNING_ERROR",
            QueryError::InvalidRequest(_) => "INVALID_REQUEST",
            QueryError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Rejected fragments carried by this error
    pub fn rejected(&self) -> &[RejectedFilter] {
        match self {
            QueryError::ValidationFailed(r) | QueryError::NoUsableCriteria(r) => r,
            _ => &[],
        }
    }
}

impl From<SchemaError> for QueryError {
    fn from(err: SchemaError) -> Self {
        match err.code() {
            SchemaErrorCode::SchemaNotFound => QueryError::SchemaNotFound(err.message().to_string()),
            SchemaErrorCode::RelationshipNotFound => {
                QueryError::RelationshipNotFound(err.message().to_string())
            }
            SchemaErrorCode::Duplicate | SchemaErrorCode::Malformed => {
                QueryError::Schema(err.message().to_string())
            }
        }
    }
}
