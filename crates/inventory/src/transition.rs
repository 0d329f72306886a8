use serde::{Deserialize, Serialize};

use stockwatch_core::ProductId;

use crate::event::InventoryEvent;
use crate::state::StockObservation;
use crate::threshold::TransitionKind;

/// A classified transition, ready to be appended to the audit log.
///
/// `previous_quantity` is the level held immediately before the triggering
/// event; `new_quantity` is that event's quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransition {
    pub product_id: ProductId,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub event_type: TransitionKind,
}

impl StockTransition {
    /// Build the log entry for an observation, if it classified as a transition.
    pub fn from_observation(event: &InventoryEvent, observation: &StockObservation) -> Option<Self> {
        observation.transition.map(|kind| Self {
            product_id: event.product_id.clone(),
            previous_quantity: observation.previous,
            new_quantity: observation.current,
            event_type: kind,
        })
    }
}
