//! Append-only audit log of stock threshold transitions.
//!
//! Written by the ingestion loop, read by the query API. Both sides only
//! share this storage boundary, never the in-memory stock levels.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockwatch_core::ProductId;
use stockwatch_inventory::{StockTransition, TransitionKind};

use crate::retry::Transient;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryEventLog;
pub use postgres::PostgresEventLog;

/// Default number of records returned by a query.
pub const DEFAULT_QUERY_LIMIT: u32 = 20;

/// Upper bound on records returned by a single query.
pub const MAX_QUERY_LIMIT: u32 = 1000;

/// A persisted transition, as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Storage-assigned, increasing with insertion order.
    pub id: i64,
    pub product_id: ProductId,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub event_type: TransitionKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum EventLogError {
    /// Storage could not be reached (connection refused, pool exhausted, IO).
    #[error("event log storage unavailable: {0}")]
    Unavailable(String),

    /// No answer in time. The statement may still have committed, so a
    /// timed-out append must not be resent.
    #[error("event log operation timed out after {0:?}")]
    Timeout(Duration),

    /// Storage reached but refused the statement (constraint, schema, permissions).
    #[error("event log storage rejected the operation: {0}")]
    Rejected(String),

    #[error("stored event log row is malformed: {0}")]
    Malformed(String),
}

impl Transient for EventLogError {
    fn is_transient(&self) -> bool {
        matches!(self, EventLogError::Unavailable(_))
    }
}

/// Durable transition log.
#[async_trait::async_trait]
pub trait EventLogStore: Send + Sync {
    /// Insert one transition. Returns the number of rows the storage reports
    /// as affected; anything other than 1 is an anomaly for the caller to report.
    async fn append(&self, transition: &StockTransition) -> Result<u64, EventLogError>;

    /// Most recent transitions for a product, newest first, at most `limit`.
    async fn list_for_product(
        &self,
        product_id: &ProductId,
        limit: u32,
    ) -> Result<Vec<TransitionRecord>, EventLogError>;
}

#[async_trait::async_trait]
impl<S> EventLogStore for std::sync::Arc<S>
where
    S: EventLogStore + ?Sized,
{
    async fn append(&self, transition: &StockTransition) -> Result<u64, EventLogError> {
        (**self).append(transition).await
    }

    async fn list_for_product(
        &self,
        product_id: &ProductId,
        limit: u32,
    ) -> Result<Vec<TransitionRecord>, EventLogError> {
        (**self).list_for_product(product_id, limit).await
    }
}
