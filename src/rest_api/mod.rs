//! # REST API Module
//!
//! HTTP surface of the query core: response shaping per request format,
//! error mapping and the axum router.

pub mod errors;
pub mod response;
pub mod server;

pub use errors::{ErrorResponse, RestError, RestResult};
pub use response::{format_rows, PaginationResult};
pub use server::{router, serve, AppState, HttpConfig, RowSource};
