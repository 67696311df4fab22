//! Begin/complete logging around one unit of work
//!
//! - `{NAME}_BEGIN` on creation
//! - `{NAME}_COMPLETE` on `complete()`
//! - `{NAME}_ERROR` on `fail()` or when dropped without either

use super::logger::{Logger, Severity};

/// Scope guard for one query build
pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    finished: bool,
}

impl ObservationScope {
    /// Open a scope, logging `{name}_BEGIN` at TRACE level
    pub fn begin(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let scope = Self {
            name,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            finished: false,
        };
        scope.log(Severity::Trace, "BEGIN", &[]);
        scope
    }

    /// Close the scope successfully
    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        self.log(Severity::Info, "COMPLETE", extra);
    }

    /// Close the scope with a failure reason
    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        self.log(Severity::Warn, "ERROR", &[("reason", reason)]);
    }

    fn log(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend_from_slice(extra);
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            self.log(Severity::Warn, "ERROR", &[("reason", "abandoned")]);
        }
    }
}
