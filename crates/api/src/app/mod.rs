//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: shared handles the handlers need (event log)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: query parameter parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use stockwatch_auth::CredentialValidator;
use stockwatch_infra::event_log::EventLogStore;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by the server and tests).
pub fn build_app(
    event_log: Arc<dyn EventLogStore>,
    validator: Arc<dyn CredentialValidator>,
) -> Router {
    let auth_state = middleware::AuthState { validator };
    let services = Arc::new(services::AppServices::new(event_log));

    // Protected routes: require valid Basic credentials.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
