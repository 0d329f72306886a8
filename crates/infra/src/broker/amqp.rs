//! AMQP (RabbitMQ) connector and subscription.
//!
//! ## Topology
//!
//! - **Exchange**: `inventory`, topic, durable
//! - **Queue**: server-named, non-durable, exclusive, auto-delete; one per process
//! - **Binding**: `inventory.updates`
//! - **Consumer**: auto-ack (at-most-once); a crash mid-message loses that message

use lapin::options::{
    BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::uri::AMQPUri;
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tokio_stream::StreamExt;
use tracing::{info, instrument};

use super::{BrokerError, Delivery, DeliverySource, Topology};
use crate::retry::{RetryError, RetryPolicy, with_retry};

/// Establishes broker connections with bounded retries.
#[derive(Debug, Clone)]
pub struct AmqpConnector {
    policy: RetryPolicy,
}

impl AmqpConnector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Connect, retrying failed attempts per the policy.
    ///
    /// A malformed URL fails immediately. Exhausting the policy returns
    /// [`BrokerError::RetriesExhausted`], which callers treat as fatal.
    #[instrument(skip(self, url), fields(max_attempts = self.policy.max_attempts), err)]
    pub async fn connect(&self, url: &str) -> Result<AmqpConnection, BrokerError> {
        url.parse::<AMQPUri>().map_err(BrokerError::InvalidUrl)?;

        let connection = with_retry(&self.policy, "broker.connect", || async {
            let properties = ConnectionProperties::default()
                .with_executor(tokio_executor_trait::Tokio::current())
                .with_reactor(tokio_reactor_trait::Tokio);
            Connection::connect(url, properties)
                .await
                .map_err(|e| BrokerError::Connect(e.to_string()))
        })
        .await
        .map_err(|e| match e {
            RetryError::Exhausted { attempts, last, .. } => BrokerError::RetriesExhausted {
                attempts,
                last: last.to_string(),
            },
            RetryError::Permanent { error, .. } => error,
        })?;

        info!("connected to broker");
        Ok(AmqpConnection { connection })
    }
}

/// An open broker connection, not yet subscribed.
pub struct AmqpConnection {
    connection: Connection,
}

impl AmqpConnection {
    /// Declare the exchange, a private queue bound to `topology`, and start consuming.
    #[instrument(
        skip(self, topology),
        fields(exchange = %topology.exchange, routing_key = %topology.routing_key),
        err
    )]
    pub async fn subscribe(self, topology: &Topology) -> Result<AmqpSource, BrokerError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| topology_error("channel", e))?;

        channel
            .exchange_declare(
                &topology.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| topology_error("exchange", e))?;

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    durable: false,
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| topology_error("queue", e))?;

        channel
            .queue_bind(
                queue.name().as_str(),
                &topology.exchange,
                &topology.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| topology_error("binding", e))?;

        let consumer_tag = format!("stockwatch-{}", uuid::Uuid::now_v7());
        let consumer = channel
            .basic_consume(
                queue.name().as_str(),
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| topology_error("consumer", e))?;

        info!(queue = queue.name().as_str(), consumer_tag = %consumer_tag, "subscribed to inventory updates");

        Ok(AmqpSource {
            consumer,
            _channel: channel,
            _connection: self.connection,
        })
    }
}

fn topology_error(what: &'static str, err: lapin::Error) -> BrokerError {
    BrokerError::Topology {
        what,
        reason: err.to_string(),
    }
}

/// Live subscription. Owns the channel and connection so they stay open
/// for as long as deliveries are being read.
pub struct AmqpSource {
    consumer: Consumer,
    _channel: Channel,
    _connection: Connection,
}

#[async_trait::async_trait]
impl DeliverySource for AmqpSource {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        self.consumer.next().await.map(|result| {
            result
                .map(|delivery| Delivery {
                    payload: delivery.data,
                    routing_key: delivery.routing_key.as_str().to_string(),
                })
                .map_err(|e| BrokerError::Delivery(e.to_string()))
        })
    }
}
