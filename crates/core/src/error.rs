//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockError>;

/// Domain-level error.
///
/// Deterministic failures only (malformed identifiers, unknown kinds).
/// Broker and storage failures have their own error types in `stockwatch-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// An identifier was invalid (e.g. blank product id).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A stored event kind did not name a known transition.
    #[error("unknown transition kind: {0}")]
    UnknownTransition(String),
}

impl StockError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
