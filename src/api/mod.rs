//! HTTP surface: router wiring, handlers and wire types.
pub mod handlers;
pub mod routes;
pub mod schema;
