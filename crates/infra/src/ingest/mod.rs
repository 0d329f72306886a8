//! Inventory update ingestion loop.
//!
//! One delivery at a time, fully, in broker order:
//! decode → read prior level → classify → overwrite level → persist transition.
//!
//! The loop owns the [`StockLevels`] table outright; nothing else can reach it.
//! Because the next delivery is not pulled until the current one is
//! persisted, a slow store applies backpressure to the broker.
//!
//! ## Failure policy
//!
//! | Condition | Handling |
//! |-----------|----------|
//! | Undecodable payload | `Skip`: logged, levels untouched, loop continues. `Halt`: fatal |
//! | Storage unavailable | retried per `write_retry`, then fatal |
//! | Storage write timeout | fatal, never resent (the insert may have committed) |
//! | Other storage failure | fatal |
//! | Rows affected ≠ 1 | logged as an anomaly, loop continues |
//! | Broker stream error | fatal |
//! | Broker stream ends | loop returns its stats; the caller decides |

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use stockwatch_inventory::{DecodeError, InventoryEvent, StockLevels, StockTransition};

use crate::broker::{BrokerError, DeliverySource};
use crate::event_log::{EventLogError, EventLogStore};
use crate::retry::{RetryPolicy, with_retry};

/// What to do with a payload that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrorPolicy {
    /// Log and move on to the next delivery.
    #[default]
    Skip,
    /// Stop ingestion with an error.
    Halt,
}

impl core::str::FromStr for DecodeErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "halt" => Ok(Self::Halt),
            other => Err(format!("expected `skip` or `halt`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestPolicy {
    pub on_decode_error: DecodeErrorPolicy,
    /// Upper bound on a single storage write attempt. Hitting it is fatal.
    pub write_timeout: Duration,
    pub write_retry: RetryPolicy,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            on_decode_error: DecodeErrorPolicy::Skip,
            write_timeout: Duration::from_secs(5),
            write_retry: RetryPolicy::default(),
        }
    }
}

/// Result of handling one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Payload could not be decoded and was dropped.
    Skipped,
    /// Level updated; no threshold crossed.
    Unchanged { previous: i64, current: i64 },
    /// Transition persisted; `rows_affected` is what storage reported.
    Logged {
        transition: StockTransition,
        rows_affected: u64,
    },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("undecodable inventory update: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to persist transition: {0}")]
    Storage(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Counters for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub skipped: u64,
    pub logged: u64,
    pub anomalies: u64,
}

/// Single-writer ingestion pipeline.
pub struct Ingestor<S> {
    levels: StockLevels,
    store: S,
    policy: IngestPolicy,
    stats: IngestStats,
}

impl<S: EventLogStore> Ingestor<S> {
    pub fn new(levels: StockLevels, store: S, policy: IngestPolicy) -> Self {
        Self {
            levels,
            store,
            policy,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Drive the pipeline until the source ends or a fatal error occurs.
    pub async fn run<D: DeliverySource>(mut self, mut source: D) -> Result<IngestStats, IngestError> {
        info!(known_products = self.levels.len(), "ingestion started");

        while let Some(delivery) = source.next_delivery().await {
            let delivery = delivery.map_err(|e| {
                error!(error = %e, "broker delivery failed");
                IngestError::Broker(e)
            })?;
            debug!(routing_key = %delivery.routing_key, bytes = delivery.payload.len(), "delivery received");

            self.handle(&delivery.payload).await.inspect_err(|e| {
                error!(error = %e, "ingestion halted");
            })?;
        }

        warn!(stats = ?self.stats(), "delivery stream ended");
        Ok(self.stats())
    }

    /// Process one raw payload end to end.
    pub async fn handle(&mut self, payload: &[u8]) -> Result<Outcome, IngestError> {
        self.stats.received += 1;

        let event = match InventoryEvent::decode_wire(payload) {
            Ok(event) => event,
            Err(e) => match self.policy.on_decode_error {
                DecodeErrorPolicy::Skip => {
                    self.stats.skipped += 1;
                    warn!(
                        error = %e,
                        payload = %String::from_utf8_lossy(payload),
                        "skipping undecodable inventory update"
                    );
                    return Ok(Outcome::Skipped);
                }
                DecodeErrorPolicy::Halt => return Err(IngestError::Decode(e)),
            },
        };

        if event.is_defective() {
            warn!(
                product_id = %event.product_id,
                quantity = event.quantity,
                "negative quantity reported by producer"
            );
        }

        let observation = self.levels.observe(&event.product_id, event.quantity);

        let Some(transition) = StockTransition::from_observation(&event, &observation) else {
            debug!(
                product_id = %event.product_id,
                previous = observation.previous,
                current = observation.current,
                "no threshold crossed"
            );
            return Ok(Outcome::Unchanged {
                previous: observation.previous,
                current: observation.current,
            });
        };

        let rows_affected = self.persist(&transition).await?;

        if rows_affected == 1 {
            self.stats.logged += 1;
            info!(
                product_id = %transition.product_id,
                event_type = %transition.event_type,
                previous_quantity = transition.previous_quantity,
                new_quantity = transition.new_quantity,
                "transition logged"
            );
        } else {
            self.stats.anomalies += 1;
            error!(
                product_id = %transition.product_id,
                event_type = %transition.event_type,
                rows_affected,
                "unexpected row count when logging transition"
            );
        }

        Ok(Outcome::Logged {
            transition,
            rows_affected,
        })
    }

    async fn persist(&self, transition: &StockTransition) -> Result<u64, IngestError> {
        let timeout = self.policy.write_timeout;

        with_retry(&self.policy.write_retry, "event_log.append", || async {
            match tokio::time::timeout(timeout, self.store.append(transition)).await {
                Ok(result) => result,
                Err(_) => Err(EventLogError::Timeout(timeout)),
            }
        })
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests;
