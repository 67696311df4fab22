//! CLI module for criteria-sql
//!
//! Provides command-line interface for:
//! - compile: SQL, bound parameters and count query for one request
//! - explain: descriptor, JOIN plan and WHERE fragments for one request
//! - check-schemas: load and cross-check a schema directory

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, QueryArgs};
pub use commands::{check_schemas, compile, explain, parse_query_string, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

/// Parse arguments, run the command, and report failures on stdout
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}
