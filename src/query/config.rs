//! Query configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! (or no file at all) is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{QueryError, QueryResult};

/// Query core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Largest page a client may request (default: 1000)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Page size when the request names none (default: 20)
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Turn any rejected filter into a single 400 (default: false)
    #[serde(default)]
    pub strict: bool,

    /// Fail when no usable criterion or search remains (default: false)
    #[serde(default)]
    pub require_criteria: bool,

    /// Separator between display columns in label projections (default: " ")
    #[serde(default = "default_display_separator")]
    pub display_name_separator: String,

    /// SELECT DISTINCT when fan-out relationship JOINs are present (default: true)
    #[serde(default = "default_true")]
    pub distinct_on_relationship_joins: bool,
}

fn default_max_page_size() -> u64 {
    1000
}

fn default_page_size() -> u64 {
    20
}

fn default_display_separator() -> String {
    " ".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            default_page_size: default_page_size(),
            strict: false,
            require_criteria: false,
            display_name_separator: default_display_separator(),
            distinct_on_relationship_joins: true,
        }
    }
}

impl QueryConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: QueryConfig = serde_json::from_str(&content)
            .map_err(|e| QueryError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Strict-mode copy of this configuration
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.max_page_size == 0 {
            return Err(QueryError::Config("max_page_size must be > 0".into()));
        }
        if self.default_page_size == 0 {
            return Err(QueryError::Config("default_page_size must be > 0".into()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(QueryError::Config(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// Clamp a requested page size into `1..=max_page_size`
    pub fn clamp_page_size(&self, requested: u64) -> u64 {
        requested.clamp(1, self.max_page_size)
    }
}
