//! Stock threshold classification.
//!
//! Pure and deterministic: no IO, no clock, no state.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use stockwatch_core::StockError;

/// Quantities strictly below this value count as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// A stock-level threshold crossing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    OutOfStock,
    LowStock,
    BackInStock,
}

impl TransitionKind {
    /// Stable name used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::OutOfStock => "OUT_OF_STOCK",
            TransitionKind::LowStock => "LOW_STOCK",
            TransitionKind::BackInStock => "BACK_IN_STOCK",
        }
    }
}

impl core::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OUT_OF_STOCK" => Ok(TransitionKind::OutOfStock),
            "LOW_STOCK" => Ok(TransitionKind::LowStock),
            "BACK_IN_STOCK" => Ok(TransitionKind::BackInStock),
            other => Err(StockError::UnknownTransition(other.to_string())),
        }
    }
}

/// Classify a quantity change.
///
/// Rules are evaluated in order, first match wins:
/// 1. `current <= 0 && previous > 0` → `OutOfStock`
/// 2. `current < 10 && previous >= 10` → `LowStock`
/// 3. `current > 0 && previous <= 0` → `BackInStock`
///
/// Anything else is not a transition. A drop from 10+ straight to zero is
/// reported as `OutOfStock` only.
pub fn classify(previous: i64, current: i64) -> Option<TransitionKind> {
    if current <= 0 && previous > 0 {
        Some(TransitionKind::OutOfStock)
    } else if current < LOW_STOCK_THRESHOLD && previous >= LOW_STOCK_THRESHOLD {
        Some(TransitionKind::LowStock)
    } else if current > 0 && previous <= 0 {
        Some(TransitionKind::BackInStock)
    } else {
        None
    }
}
