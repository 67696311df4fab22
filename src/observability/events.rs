//! Typed log events
//!
//! Every line the crate logs is named by one of these.

use std::fmt;

use super::logger::{Logger, Severity};

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Startup
    /// Configuration file read and validated
    ConfigLoaded,
    /// Schema bundles loaded and cross-checked
    SchemasLoaded,
    /// HTTP listener bound
    Serving,

    // Query build
    /// Request shape detected and parsed
    RequestParsed,
    /// A filter, sort or search field was dropped
    FilterRejected,
    /// A new JOIN was added to the plan
    JoinPlanned,
    /// SQL and count SQL produced
    QueryCompiled,
    /// Alias requested that was never planned
    JoinPlanningDefect,
    /// Request failed
    QueryFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::Serving => "SERVING",
            Event::RequestParsed => "REQUEST_PARSED",
            Event::FilterRejected => "FILTER_REJECTED",
            Event::JoinPlanned => "JOIN_PLANNED",
            Event::QueryCompiled => "QUERY_COMPILED",
            Event::JoinPlanningDefect => "JOIN_PLANNING_DEFECT",
            Event::QueryFailed => "QUERY_FAILED",
        }
    }

    /// Level the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::JoinPlanned => Severity::Trace,
            Event::FilterRejected => Severity::Warn,
            Event::JoinPlanningDefect => Severity::Error,
            Event::QueryFailed => Severity::Warn,
            _ => Severity::Info,
        }
    }

    /// Log this event with fields
    pub fn emit(&self, fields: &[(&str, &str)]) {
        Logger::log(self.severity(), self.as_str(), fields);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
