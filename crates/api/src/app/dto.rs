use axum::http::StatusCode;
use serde::Deserialize;

use stockwatch_core::ProductId;
use stockwatch_infra::event_log::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};

use crate::app::errors;

/// Raw `GET /events` query string.
///
/// Both fields stay strings so malformed values get our own error body
/// rather than the extractor's rejection.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub product_id: Option<String>,
    pub limit: Option<String>,
}

/// Validated `GET /events` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsRequest {
    pub product_id: ProductId,
    pub limit: u32,
}

impl EventsQuery {
    pub fn validate(self) -> Result<EventsRequest, axum::response::Response> {
        let product_id = self
            .product_id
            .ok_or_else(|| {
                errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "missing_product_id",
                    "product_id query parameter is required",
                )
            })
            .and_then(|raw| {
                ProductId::new(raw).map_err(|e| {
                    errors::json_error(StatusCode::BAD_REQUEST, "invalid_product_id", e.to_string())
                })
            })?;

        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_QUERY_LIMIT,
            Some(raw) => parse_limit(raw)?,
        };

        Ok(EventsRequest { product_id, limit })
    }
}

fn parse_limit(raw: &str) -> Result<u32, axum::response::Response> {
    let invalid = || {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_limit",
            "limit must be a positive integer",
        )
    };

    let n: i64 = raw.parse().map_err(|_| invalid())?;
    if n <= 0 {
        return Err(invalid());
    }
    Ok(n.min(i64::from(MAX_QUERY_LIMIT)) as u32)
}
