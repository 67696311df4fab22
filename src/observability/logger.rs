//! Structured JSON logger
//!
//! - One line per event
//! - `event` first, then `severity`, then fields sorted by key
//! - Synchronous, unbuffered
//! - Written to stderr; stdout belongs to command output
//! - Lines below `CRITERIA_SQL_LOG` (trace|info|warn|error, default info)
//!   are dropped

use std::fmt;
use std::io::{self, Write};
use std::sync::OnceLock;

use serde_json::Value;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-criterion detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Dropped input, request still served
    Warn = 2,
    /// Request failed
    Error = 3,
    /// Process cannot continue
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Parse a level name in any case
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Some(Severity::Trace),
            "INFO" => Some(Severity::Info),
            "WARN" | "WARNING" => Some(Severity::Warn),
            "ERROR" => Some(Severity::Error),
            "FATAL" => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON line logger
pub struct Logger;

impl Logger {
    /// Log an event if its severity passes the threshold
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < Self::threshold() {
            return;
        }
        let line = Self::render(severity, event, fields);
        Self::write_line(&mut io::stderr(), &line);
    }

    /// Lowest severity written, read once from `CRITERIA_SQL_LOG`
    pub fn threshold() -> Severity {
        static THRESHOLD: OnceLock<Severity> = OnceLock::new();
        *THRESHOLD.get_or_init(|| {
            std::env::var("CRITERIA_SQL_LOG")
                .ok()
                .and_then(|v| Severity::parse(&v))
                .unwrap_or(Severity::Info)
        })
    }

    /// Render one log line, newline included
    pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        let mut line = String::with_capacity(128);
        line.push_str("{\"event\":");
        line.push_str(&quote(event));
        line.push_str(",\"severity\":");
        line.push_str(&quote(severity.as_str()));
        for (key, value) in sorted {
            line.push(',');
            line.push_str(&quote(key));
            line.push(':');
            line.push_str(&quote(value));
        }
        line.push_str("}\n");
        line
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        // Logging never fails the caller
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
