//! Broker-facing delivery sources.
//!
//! The ingestion loop only sees [`DeliverySource`]; the AMQP implementation
//! lives behind the `amqp` feature, and [`ChannelSource`] feeds payloads from
//! an in-process channel for tests/dev.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::retry::Transient;

#[cfg(feature = "amqp")]
pub mod amqp;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpConnection, AmqpConnector, AmqpSource};

/// Topic exchange inventory updates are published to.
pub const INVENTORY_EXCHANGE: &str = "inventory";

/// Routing key for inventory quantity updates.
pub const INVENTORY_UPDATES_ROUTING_KEY: &str = "inventory.updates";

/// Exchange/binding this service subscribes with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub routing_key: String,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            exchange: INVENTORY_EXCHANGE.to_string(),
            routing_key: INVENTORY_UPDATES_ROUTING_KEY.to_string(),
        }
    }
}

/// One raw message as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub routing_key: String,
}

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The URL could not be parsed; retrying cannot help.
    #[error("invalid broker url: {0}")]
    InvalidUrl(String),

    #[error("broker connection failed: {0}")]
    Connect(String),

    #[error("could not connect to broker after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("failed to declare {what}: {reason}")]
    Topology { what: &'static str, reason: String },

    #[error("delivery stream failed: {0}")]
    Delivery(String),
}

impl Transient for BrokerError {
    fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Connect(_))
    }
}

/// Ordered stream of deliveries for a single subscriber.
///
/// `None` means the stream ended (connection or channel closed).
#[async_trait::async_trait]
pub trait DeliverySource: Send {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>>;
}

/// In-process delivery source backed by a bounded channel.
#[derive(Debug)]
pub struct ChannelSource {
    routing_key: String,
    receiver: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it. The source ends once
    /// every sender is dropped and the buffer is drained.
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                routing_key: INVENTORY_UPDATES_ROUTING_KEY.to_string(),
                receiver: rx,
            },
        )
    }
}

#[async_trait::async_trait]
impl DeliverySource for ChannelSource {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        self.receiver.recv().await.map(|payload| {
            Ok(Delivery {
                payload,
                routing_key: self.routing_key.clone(),
            })
        })
    }
}
