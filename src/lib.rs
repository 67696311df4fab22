//! criteria-sql - relationship-aware criteria-to-SQL compiler
//!
//! Turns grid and list request parameters (AG-Grid, MUI DataGrid, bracket
//! and flat query strings) into validated, parameterised SQL with
//! deduplicated JOINs.

pub mod cli;
pub mod observability;
pub mod query;
pub mod rest_api;
pub mod schema;
