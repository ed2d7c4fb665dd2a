//! In-memory broker
//!
//! Channel-backed implementation of the broker contract, used by the test
//! suite and for local runs without a real broker. Routing follows the
//! same direct-exchange convention as real drivers: a producer resolves
//! `(exchange, routing key)` through the binding table and falls back to
//! the queue name itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::broker::{
    Acker, BrokerConnection, BrokerConsumer, BrokerProducer, Delivery, DeliveryStream,
};
use crate::Result;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Registry {
    /// Queue name to delivery sender
    queues: HashMap<String, mpsc::Sender<Delivery>>,
    /// (exchange, routing key) to queue name
    bindings: HashMap<(String, String), String>,
}

/// Broker that lives entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    registry: Arc<Mutex<Registry>>,
    acked: Arc<AtomicUsize>,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deliveries acknowledged so far.
    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerConnection for MemoryBroker {
    async fn open_consumer(&self, queue_name: &str) -> Result<Box<dyn BrokerConsumer>> {
        Ok(Box::new(MemoryConsumer {
            broker: self.clone(),
            queue: queue_name.to_string(),
            binding: None,
        }))
    }

    async fn open_producer(&self, _target: &str) -> Result<Box<dyn BrokerProducer>> {
        Ok(Box::new(MemoryProducer {
            broker: self.clone(),
        }))
    }

    async fn close(&self) {
        let mut registry = self.registry.lock().await;
        registry.queues.clear();
        registry.bindings.clear();
    }
}

struct MemoryConsumer {
    broker: MemoryBroker,
    queue: String,
    binding: Option<(String, String)>,
}

#[async_trait]
impl BrokerConsumer for MemoryConsumer {
    fn bind(&mut self, exchange: &str, routing_key: &str, queue: &str) -> Result<()> {
        self.queue = queue.to_string();
        self.binding = Some((exchange.to_string(), routing_key.to_string()));
        Ok(())
    }

    async fn open(&mut self) -> Result<DeliveryStream> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut registry = self.broker.registry.lock().await;
        if let Some((exchange, routing_key)) = &self.binding {
            registry
                .bindings
                .insert((exchange.clone(), routing_key.clone()), self.queue.clone());
        }
        // A second consumer on the same queue replaces the first; the
        // dropped sender closes the old delivery channel.
        registry.queues.insert(self.queue.clone(), tx);
        Ok(rx)
    }

    async fn cancel(&mut self) {
        let mut registry = self.broker.registry.lock().await;
        if registry.queues.remove(&self.queue).is_some() {
            debug!(queue = %self.queue, "in-memory consumer cancelled");
        }
    }
}

struct MemoryProducer {
    broker: MemoryBroker,
}

#[async_trait]
impl BrokerProducer for MemoryProducer {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        queue: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let sender = {
            let registry = self.broker.registry.lock().await;
            let bound = registry
                .bindings
                .get(&(exchange.to_string(), routing_key.to_string()))
                .cloned()
                .unwrap_or_else(|| queue.to_string());
            registry.queues.get(&bound).cloned()
        };

        // Unroutable messages are dropped, as a direct exchange would.
        let Some(sender) = sender else {
            debug!(routing_key = %routing_key, "no queue bound; message dropped");
            return Ok(());
        };

        let delivery = Delivery::new(
            Bytes::copy_from_slice(bytes),
            Box::new(CountingAcker {
                acked: Arc::clone(&self.broker.acked),
            }),
        );
        if sender.send(delivery).await.is_err() {
            debug!(queue = %queue, "delivery channel closed; message dropped");
        }
        Ok(())
    }
}

struct CountingAcker {
    acked: Arc<AtomicUsize>,
}

#[async_trait]
impl Acker for CountingAcker {
    async fn ack(self: Box<Self>, _multiple: bool) {
        self.acked.fetch_add(1, Ordering::SeqCst);
    }
}
