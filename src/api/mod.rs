//! API module - HTTP routes, handlers, and models

pub mod handlers;
pub mod models;
pub mod page;
pub mod routes;
