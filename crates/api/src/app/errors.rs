use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockwatch_infra::event_log::EventLogError;

/// Body of the `404` returned when a product has no logged transitions.
pub const NO_LOGS_FOUND: &str = "No logs found for product ID";

pub fn event_log_error_to_response(err: EventLogError) -> axum::response::Response {
    let code = match &err {
        EventLogError::Unavailable(_) | EventLogError::Timeout(_) => "storage_unavailable",
        EventLogError::Rejected(_) | EventLogError::Malformed(_) => "storage_error",
    };
    json_error(StatusCode::INTERNAL_SERVER_ERROR, code, err.to_string())
}

pub fn not_found_text(message: &'static str) -> axum::response::Response {
    (StatusCode::NOT_FOUND, message).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
