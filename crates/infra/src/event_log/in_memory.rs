use std::sync::RwLock;

use chrono::Utc;

use stockwatch_core::ProductId;
use stockwatch_inventory::StockTransition;

use super::{EventLogError, EventLogStore, TransitionRecord};

/// In-memory transition log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    records: RwLock<Vec<TransitionRecord>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record in insertion order.
    pub fn all(&self) -> Vec<TransitionRecord> {
        self.records
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl EventLogStore for InMemoryEventLog {
    async fn append(&self, transition: &StockTransition) -> Result<u64, EventLogError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| EventLogError::Unavailable("lock poisoned".to_string()))?;

        let id = records.last().map(|r| r.id + 1).unwrap_or(1);
        records.push(TransitionRecord {
            id,
            product_id: transition.product_id.clone(),
            previous_quantity: transition.previous_quantity,
            new_quantity: transition.new_quantity,
            event_type: transition.event_type,
            created_at: Utc::now(),
        });

        Ok(1)
    }

    async fn list_for_product(
        &self,
        product_id: &ProductId,
        limit: u32,
    ) -> Result<Vec<TransitionRecord>, EventLogError> {
        let records = self
            .records
            .read()
            .map_err(|_| EventLogError::Unavailable("lock poisoned".to_string()))?;

        Ok(records
            .iter()
            .rev()
            .filter(|r| &r.product_id == product_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
