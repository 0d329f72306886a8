//! Infrastructure layer: broker, storage, config, and the ingestion loop.

pub mod broker;
pub mod config;
pub mod event_log;
pub mod ingest;
pub mod retry;
