//! Observability
//!
//! Structured JSON logging with typed events.
//!
//! # Principles
//!
//! 1. Logging is read-only and never fails the caller
//! 2. No background threads
//! 3. Deterministic output (sorted fields)
//!
//! # Usage
//!
//! ```ignore
//! use criteria_sql::observability::{Event, Logger};
//!
//! Event::QueryCompiled.emit(&[("joins", "2")]);
//! Logger::warn("CUSTOM_EVENT", &[("key", "value")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;
