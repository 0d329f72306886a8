//! Inventory stock-level domain.
//!
//! Threshold classification, last-known stock levels and the broker event
//! format, implemented purely as deterministic logic (no IO, no storage).

pub mod event;
pub mod state;
pub mod threshold;
pub mod transition;

pub use event::{DecodeError, InventoryEvent};
pub use state::{StockLevels, StockObservation};
pub use threshold::{LOW_STOCK_THRESHOLD, TransitionKind, classify};
pub use transition::StockTransition;
