//! HTTP surface: error mapping and routes.

pub mod error;
pub mod routes;
