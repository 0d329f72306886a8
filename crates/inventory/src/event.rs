//! Inventory update events and their broker wire format.
//!
//! Producers publish each event as a JSON *string literal* whose content is
//! the JSON object, e.g.
//!
//! ```text
//! "{\"product_id\":\"P1\",\"quantity\":5,\"timestamp\":\"2024-05-01 10:00:00\"}"
//! ```
//!
//! so decoding takes two passes. Encoding mirrors it, so any producer built
//! on this crate stays compatible with existing ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockwatch_core::ProductId;

/// A stock update observed by the upstream inventory system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEvent {
    pub product_id: ProductId,
    /// New absolute quantity. Negative values are a producer defect but are
    /// still accepted and classified as "not in stock".
    pub quantity: i64,
    /// Producer-supplied timestamp; opaque, never parsed.
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Outer layer: the body was not a JSON string literal.
    #[error("payload is not a JSON string: {0}")]
    Envelope(#[source] serde_json::Error),

    /// Inner layer: the string did not contain a valid inventory event.
    #[error("payload string is not an inventory event: {0}")]
    Body(#[source] serde_json::Error),
}

impl InventoryEvent {
    pub fn new(product_id: ProductId, quantity: i64, timestamp: impl Into<String>) -> Self {
        Self {
            product_id,
            quantity,
            timestamp: timestamp.into(),
        }
    }

    /// Decode a raw broker payload (double-encoded JSON).
    pub fn decode_wire(payload: &[u8]) -> Result<Self, DecodeError> {
        let body: String = serde_json::from_slice(payload).map_err(DecodeError::Envelope)?;
        serde_json::from_str(&body).map_err(DecodeError::Body)
    }

    /// Encode into the broker wire format (double-encoded JSON).
    pub fn encode_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        let body = serde_json::to_string(self)?;
        serde_json::to_vec(&body)
    }

    pub fn is_defective(&self) -> bool {
        self.quantity < 0
    }
}
