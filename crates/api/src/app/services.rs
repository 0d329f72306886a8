use std::sync::Arc;

use stockwatch_infra::event_log::EventLogStore;

/// Read-side handles shared by all request handlers.
///
/// Only durable storage is reachable from here; in-memory stock levels stay
/// private to the ingestion loop.
#[derive(Clone)]
pub struct AppServices {
    pub event_log: Arc<dyn EventLogStore>,
}

impl AppServices {
    pub fn new(event_log: Arc<dyn EventLogStore>) -> Self {
        Self { event_log }
    }
}
