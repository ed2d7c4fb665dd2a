//! NATS driver for the AMQ messaging layer
//!
//! Binds the broker traits from `amq-core` to core NATS. NATS has no
//! exchanges; the routing key doubles as the subject, so a queue name
//! like `sys_amq_88880001` maps to the subject `88880001`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use amq_core::broker::{
    BrokerConnection, BrokerConsumer, BrokerProducer, Delivery, DeliveryStream, NoopAcker,
};
use amq_core::{Error, Result};

const CHANNEL_CAPACITY: usize = 64;

/// Broker connection backed by one NATS client.
pub struct NatsBroker {
    client: async_nats::Client,
}

impl NatsBroker {
    /// Connect to a NATS server; an empty username skips authentication.
    pub async fn connect(url: &str, username: &str, password: &str) -> Result<Arc<Self>> {
        info!(url = %url, "connecting to NATS");

        let mut options = async_nats::ConnectOptions::new();
        if !username.is_empty() {
            options = options.user_and_password(username.to_string(), password.to_string());
        }
        let client = options
            .connect(url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(Arc::new(Self { client }))
    }
}

#[async_trait]
impl BrokerConnection for NatsBroker {
    async fn open_consumer(&self, queue_name: &str) -> Result<Box<dyn BrokerConsumer>> {
        Ok(Box::new(NatsConsumer {
            client: self.client.clone(),
            subject: queue_name.to_string(),
            stop: None,
        }))
    }

    async fn open_producer(&self, _target: &str) -> Result<Box<dyn BrokerProducer>> {
        Ok(Box::new(NatsProducer {
            client: self.client.clone(),
        }))
    }

    async fn close(&self) {
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "flush on close failed");
        }
    }
}

struct NatsConsumer {
    client: async_nats::Client,
    subject: String,
    stop: Option<watch::Sender<bool>>,
}

#[async_trait]
impl BrokerConsumer for NatsConsumer {
    fn bind(&mut self, _exchange: &str, routing_key: &str, _queue: &str) -> Result<()> {
        // No exchange or binding machinery in NATS; the routing key is
        // the subject.
        self.subject = routing_key.to_string();
        Ok(())
    }

    async fn open(&mut self) -> Result<DeliveryStream> {
        let mut subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .map_err(|e| Error::ConsumerOpen(e.to_string()))?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        self.stop = Some(stop_tx);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let subject = self.subject.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    message = subscriber.next() => {
                        let Some(message) = message else { break };
                        // Core NATS is at-most-once; nothing to ack.
                        let delivery = Delivery::new(message.payload, Box::new(NoopAcker));
                        if tx.send(delivery).await.is_err() {
                            break;
                        }
                    }
                }
            }
            if let Err(e) = subscriber.unsubscribe().await {
                warn!(subject = %subject, error = %e, "unsubscribe failed");
            }
            debug!(subject = %subject, "subscription closed");
        });

        Ok(rx)
    }

    async fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(true);
        }
    }
}

struct NatsProducer {
    client: async_nats::Client,
}

#[async_trait]
impl BrokerProducer for NatsProducer {
    async fn publish(
        &self,
        _exchange: &str,
        routing_key: &str,
        _queue: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.client
            .publish(routing_key.to_string(), Bytes::copy_from_slice(bytes))
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| Error::Publish(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires a local NATS server: docker run -p 4222:4222 nats
    #[tokio::test]
    #[ignore]
    async fn test_publish_and_consume_against_local_server() {
        let broker = NatsBroker::connect("nats://localhost:4222", "", "")
            .await
            .unwrap();

        let mut consumer = broker.open_consumer("sys_amq_88880001").await.unwrap();
        consumer.bind("sys_amq", "88880001", "88880001").unwrap();
        let mut deliveries = consumer.open().await.unwrap();

        let producer = broker.open_producer("sys_amq_88880001").await.unwrap();
        producer
            .publish("sys_amq", "88880001", "88880001", b"hello")
            .await
            .unwrap();

        let delivery = deliveries.recv().await.unwrap();
        assert_eq!(delivery.body(), b"hello");

        consumer.cancel().await;
        broker.close().await;
    }
}
