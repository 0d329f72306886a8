use axum::{Router, routing::get};

pub mod events;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new().route("/events", get(events::list))
}
