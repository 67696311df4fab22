//! Schema error types
//!
//! Error codes:
//! - SCHEMA_NOT_FOUND (REJECT)
//! - SCHEMA_RELATIONSHIP_NOT_FOUND (REJECT)
//! - SCHEMA_DUPLICATE (FATAL)
//! - SCHEMA_MALFORMED (FATAL)

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
    /// Metadata is unusable, startup must stop
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Model name not registered (exact case)
    SchemaNotFound,
    /// Relationship not registered or not attached to the model
    RelationshipNotFound,
    /// Model or relationship registered twice
    Duplicate,
    /// Schema file or descriptor is invalid
    Malformed,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::SchemaNotFound => "SCHEMA_NOT_FOUND",
            SchemaErrorCode::RelationshipNotFound => "SCHEMA_RELATIONSHIP_NOT_FOUND",
            SchemaErrorCode::Duplicate => "SCHEMA_DUPLICATE",
            SchemaErrorCode::Malformed => "SCHEMA_MALFORMED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::SchemaNotFound | SchemaErrorCode::RelationshipNotFound => {
                Severity::Reject
            }
            SchemaErrorCode::Duplicate | SchemaErrorCode::Malformed => Severity::Fatal,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    model: Option<String>,
    relationship: Option<String>,
}

impl SchemaError {
    /// Create an unknown model error
    pub fn schema_not_found(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            code: SchemaErrorCode::SchemaNotFound,
            message: format!("Model '{}' not found", model),
            model: Some(model),
            relationship: None,
        }
    }

    /// Create an unknown relationship error
    pub fn relationship_not_found(model: impl Into<String>, relationship: impl Into<String>) -> Self {
        let model = model.into();
        let relationship = relationship.into();
        Self {
            code: SchemaErrorCode::RelationshipNotFound,
            message: format!(
                "Relationship '{}' not found on model '{}'",
                relationship, model
            ),
            model: Some(model),
            relationship: Some(relationship),
        }
    }

    /// Create a duplicate registration error
    pub fn duplicate(kind: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::Duplicate,
            message: format!("{} '{}' is already registered", kind, name),
            model: None,
            relationship: None,
        }
    }

    /// Create an error for a malformed schema file or descriptor
    pub fn malformed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::Malformed,
            message: format!("Malformed schema '{}': {}", source.into(), reason.into()),
            model: None,
            relationship: None,
        }
    }

    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn relationship(&self) -> Option<&str> {
        self.relationship.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
