//! Broker collaborator contract
//!
//! The provider runtime treats the underlying broker as an external
//! collaborator with a fixed, narrow interface: open a connection, bind a
//! direct exchange/queue, pull raw byte deliveries off a channel, publish
//! raw bytes. Drivers (`amq-nats`) and the in-memory broker implement
//! these traits; the core never reaches past them.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;

/// Per-delivery acknowledgment callback.
#[async_trait]
pub trait Acker: Send {
    /// Acknowledge the delivery; `multiple` follows AMQP semantics.
    async fn ack(self: Box<Self>, multiple: bool);
}

/// Acknowledgment that does nothing, for transports without per-delivery
/// acks.
#[derive(Debug)]
pub struct NoopAcker;

#[async_trait]
impl Acker for NoopAcker {
    async fn ack(self: Box<Self>, _multiple: bool) {}
}

/// One raw delivery pulled off a queue.
pub struct Delivery {
    body: Bytes,
    acker: Box<dyn Acker>,
}

impl Delivery {
    /// Wrap raw bytes and their acknowledgment callback
    pub fn new(body: Bytes, acker: Box<dyn Acker>) -> Self {
        Self { body, acker }
    }

    /// The raw payload bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Split into payload bytes and acknowledgment callback
    pub fn into_parts(self) -> (Bytes, Box<dyn Acker>) {
        (self.body, self.acker)
    }

    /// Acknowledge the delivery
    pub async fn ack(self, multiple: bool) {
        self.acker.ack(multiple).await;
    }
}

/// Receiving half of a queue's delivery channel. Closing the sending half
/// terminates the consume loop at its next receive point.
pub type DeliveryStream = mpsc::Receiver<Delivery>;

/// An open consumer on one queue.
#[async_trait]
pub trait BrokerConsumer: Send {
    /// Declare the direct exchange, queue and binding this consumer reads
    /// from.
    fn bind(&mut self, exchange: &str, routing_key: &str, queue: &str) -> Result<()>;

    /// Start consuming; deliveries arrive on the returned channel.
    async fn open(&mut self) -> Result<DeliveryStream>;

    /// Release broker-side resources and close the delivery channel.
    async fn cancel(&mut self);
}

/// A producer able to publish to one routing target.
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    /// Publish `bytes` to `queue` via the direct `exchange` under
    /// `routing_key`.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        queue: &str,
        bytes: &[u8],
    ) -> Result<()>;
}

/// A shared broker connection, safe for concurrent use by all consume
/// loops and producers.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Open a consumer for `queue_name`
    async fn open_consumer(&self, queue_name: &str) -> Result<Box<dyn BrokerConsumer>>;

    /// Open a producer for `target`
    async fn open_producer(&self, target: &str) -> Result<Box<dyn BrokerProducer>>;

    /// Close the connection and release resources
    async fn close(&self);
}
