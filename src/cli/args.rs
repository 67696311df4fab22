//! CLI argument definitions using clap
//!
//! Commands:
//! - criteria-sql compile --schemas <dir> --model <name> --query <qs>
//! - criteria-sql explain --schemas <dir> --model <name> --query <qs>
//! - criteria-sql check-schemas --schemas <dir>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// criteria-sql - compile grid/list query strings into parameterised SQL
#[derive(Parser, Debug)]
#[command(name = "criteria-sql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Inputs shared by compile and explain
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Directory of schema bundle files (*.json)
    #[arg(long)]
    pub schemas: PathBuf,

    /// Primary model name (exact case)
    #[arg(long)]
    pub model: String,

    /// Request query string, with or without the leading '?'
    #[arg(long, default_value = "")]
    pub query: String,

    /// Optional query configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the SQL, bound parameters and count query
    Compile(QueryArgs),

    /// Print the JOIN plan, WHERE fragments and ordering
    Explain(QueryArgs),

    /// Load and cross-check a schema directory
    CheckSchemas {
        /// Directory of schema bundle files (*.json)
        #[arg(long)]
        schemas: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
