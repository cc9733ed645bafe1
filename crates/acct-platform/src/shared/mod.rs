//! Shared infrastructure: errors, middleware, common API types.

pub mod api_common;
pub mod error;
pub mod middleware;
