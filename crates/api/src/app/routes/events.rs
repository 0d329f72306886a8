use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    response::IntoResponse,
};

use crate::app::dto::EventsQuery;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// `GET /events?product_id=<id>&limit=<n>`: most recent transitions first.
pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<EventsQuery>,
) -> axum::response::Response {
    let req = match query.validate() {
        Ok(req) => req,
        Err(res) => return res,
    };

    match services
        .event_log
        .list_for_product(&req.product_id, req.limit)
        .await
    {
        Ok(records) if records.is_empty() => errors::not_found_text(errors::NO_LOGS_FOUND),
        Ok(records) => {
            tracing::debug!(
                principal = principal.username(),
                product_id = %req.product_id,
                count = records.len(),
                "served transition history"
            );
            Json(records).into_response()
        }
        Err(e) => {
            tracing::error!(product_id = %req.product_id, error = %e, "event log query failed");
            errors::event_log_error_to_response(e)
        }
    }
}
