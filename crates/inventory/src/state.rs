//! Last-known stock level per product.
//!
//! Owned by a single writer (the ingestion loop); no interior mutability,
//! no locking. Lost on restart: products not seen since then are compared
//! against a zero baseline.

use std::collections::HashMap;

use stockwatch_core::ProductId;

use crate::threshold::{TransitionKind, classify};

/// Result of applying one quantity observation to [`StockLevels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockObservation {
    pub previous: i64,
    pub current: i64,
    pub transition: Option<TransitionKind>,
}

#[derive(Debug, Default, Clone)]
pub struct StockLevels {
    levels: HashMap<ProductId, i64>,
}

impl StockLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known baseline instead of an empty table.
    pub fn with_seed(seed: impl IntoIterator<Item = (ProductId, i64)>) -> Self {
        Self {
            levels: seed.into_iter().collect(),
        }
    }

    /// Last-known quantity, or 0 for a product never seen.
    pub fn get(&self, product_id: &ProductId) -> i64 {
        self.levels.get(product_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, product_id: ProductId, quantity: i64) {
        self.levels.insert(product_id, quantity);
    }

    /// Read the prior level, classify against it, then overwrite it.
    ///
    /// The stored level is replaced whether or not a transition fired.
    pub fn observe(&mut self, product_id: &ProductId, quantity: i64) -> StockObservation {
        let previous = self.get(product_id);
        let transition = classify(previous, quantity);
        self.set(product_id.clone(), quantity);

        StockObservation {
            previous,
            current: quantity,
            transition,
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
