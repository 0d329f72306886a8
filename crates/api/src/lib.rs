//! HTTP query API and process wiring.

pub mod app;
pub mod context;
pub mod middleware;
pub mod server;
