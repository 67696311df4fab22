//! # REST API Errors
//!
//! HTTP mapping for query failures. Error bodies list every rejected filter
//! so a client can fix all of them in one round trip.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::query::{QueryError, RejectedFilter};

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;

/// REST API errors
#[derive(Debug, Clone, Error)]
pub enum RestError {
    /// Parsing, validation or compilation failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The row source failed to execute a compiled query
    #[error("Database error: {0}")]
    Database(String),
}

impl RestError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::Query(e) => match e {
                // 404 Not Found
                QueryError::SchemaNotFound(_) | QueryError::RelationshipNotFound(_) => {
                    StatusCode::NOT_FOUND
                }

                // 400 Bad Request
                QueryError::ValidationFailed(_)
                | QueryError::NoUsableCriteria(_)
                | QueryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,

                // 500 Internal Server Error
                QueryError::JoinPlanning(_) | QueryError::Schema(_) | QueryError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },

            // 502 Bad Gateway
            RestError::Database(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RestError::Query(e) => e.code(),
            RestError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_filters: Vec<RejectedFilter>,
}

impl From<RestError> for ErrorResponse {
    fn from(err: RestError) -> Self {
        let rejected_filters = match &err {
            RestError::Query(e) => e.rejected().to_vec(),
            RestError::Database(_) => Vec::new(),
        };
        Self {
            status: err.status_code().as_u16(),
            code: err.code(),
            error: err.to_string(),
            rejected_filters,
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::from(self));
        (status, body).into_response()
    }
}
