//! criteria-sql CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`; any failure is printed
//! to stderr and the process exits non-zero.

use criteria_sql::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
