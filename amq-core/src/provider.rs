//! Provider runtime
//!
//! Owns the broker connection and drives the whole transaction protocol:
//! - `send` routes a typed message to its destination queue and publishes
//!   the signed payload
//! - `listen` opens exactly one consumer per queue; listening again on the
//!   same queue cancels the previous consumer first
//! - every consume loop survives decode failures, bad signatures and
//!   panicking handlers; the delivery is acknowledged regardless, failures
//!   are logged and dropped, never redelivered

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerConnection, BrokerConsumer, BrokerProducer, DeliveryStream};
use crate::codec::Codec;
use crate::dispatch::{Dispatcher, MessageProcessor};
use crate::message::Message;
use crate::metrics::{PROCESS_DURATION, PUBLISH_TOTAL, RECEIVE_TOTAL};
use crate::payload::MsgPayload;
use crate::queue::{build_queue_name, destroy_queue_name, partitioned_queue_name, Node, SystemId};
use crate::sign::Signer;
use crate::{Error, Result};

struct ConsumerEntry {
    consumer: Box<dyn BrokerConsumer>,
    task: JoinHandle<()>,
}

struct ProviderInner {
    conn: Arc<dyn BrokerConnection>,
    codec: Codec,
    dispatcher: Dispatcher,
    system_id: SystemId,
    node: Node,
    consumers: Mutex<HashMap<String, ConsumerEntry>>,
    producers: Mutex<HashMap<String, Arc<dyn BrokerProducer>>>,
}

/// Messaging provider bound to one system id and node.
///
/// Cheap to clone; all clones share the same connection, consumers and
/// producer cache.
#[derive(Clone)]
pub struct Provider {
    inner: Arc<ProviderInner>,
}

/// Handle for one open consumer, returned by [`Provider::listen`].
pub struct Listener {
    provider: Provider,
    queue: String,
}

impl Listener {
    /// Queue this listener consumes from
    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Stop consuming from the queue.
    pub async fn cancel(self) {
        self.provider.cancel(&self.queue).await;
    }
}

/// Handle returned by [`Provider::start`]; shutting it down cancels every
/// consumer and closes the broker connection.
pub struct Shutdown {
    provider: Provider,
}

impl Shutdown {
    /// Cancel all consumers and close the connection.
    pub async fn shutdown(self) {
        self.provider.close().await;
    }
}

impl Provider {
    /// Create a provider over an already-open broker connection.
    ///
    /// Connection failures surface before this point, at driver connect
    /// time; a constructed provider always has a usable connection.
    pub fn new(
        conn: Arc<dyn BrokerConnection>,
        system_id: SystemId,
        node: Node,
        secret: &str,
    ) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                conn,
                codec: Codec::new(Signer::new(secret)),
                dispatcher: Dispatcher::new(),
                system_id,
                node,
                consumers: Mutex::new(HashMap::new()),
                producers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a processor for its message type.
    pub async fn register(&self, processor: Arc<dyn MessageProcessor>) {
        self.inner.dispatcher.register(processor).await;
    }

    /// Queue name addressing `target`'s node matching this provider's.
    pub fn queue_name(&self, target: &SystemId) -> String {
        build_queue_name(target, self.inner.node)
    }

    /// This provider's own queue name, optionally for one partition.
    pub fn own_queue_name(&self, partition: Option<u32>) -> String {
        match partition {
            Some(p) => partitioned_queue_name(&self.inner.system_id, self.inner.node, p),
            None => build_queue_name(&self.inner.system_id, self.inner.node),
        }
    }

    /// Start listening on this provider's own queues.
    ///
    /// An empty `partitions` slice listens on the base queue; otherwise
    /// one consumer is opened per named partition.
    pub async fn start(&self, partitions: &[u32]) -> Result<Shutdown> {
        if partitions.is_empty() {
            self.listen(&self.own_queue_name(None)).await?;
        } else {
            for partition in partitions {
                self.listen(&self.own_queue_name(Some(*partition))).await?;
            }
        }
        Ok(Shutdown {
            provider: self.clone(),
        })
    }

    /// Open a consumer on `queue_name` and start its consume loop.
    ///
    /// At most one consumer exists per queue; a previous consumer on the
    /// same queue is cancelled before the new one opens.
    pub async fn listen(&self, queue_name: &str) -> Result<Listener> {
        let mut consumers = self.inner.consumers.lock().await;

        if let Some(mut previous) = consumers.remove(queue_name) {
            warn!(queue = %queue_name, "queue already has a consumer; cancelling it");
            previous.consumer.cancel().await;
            // The old loop exits on its own once its delivery channel
            // closes; no need to abort the task.
            drop(previous.task);
        }

        let mut consumer = self.inner.conn.open_consumer(queue_name).await?;
        let (exchange, _system, routing_key) = destroy_queue_name(queue_name);
        consumer.bind(exchange, routing_key, routing_key)?;
        let deliveries = consumer.open().await?;

        let task = tokio::spawn(consume_loop(
            Arc::clone(&self.inner),
            queue_name.to_string(),
            deliveries,
        ));
        consumers.insert(queue_name.to_string(), ConsumerEntry { consumer, task });
        info!(queue = %queue_name, "listening");

        Ok(Listener {
            provider: self.clone(),
            queue: queue_name.to_string(),
        })
    }

    /// Cancel the consumer on `queue_name`; no-op when none is open.
    pub async fn cancel(&self, queue_name: &str) {
        let entry = self.inner.consumers.lock().await.remove(queue_name);
        if let Some(mut entry) = entry {
            entry.consumer.cancel().await;
            drop(entry.task);
            info!(queue = %queue_name, "consumer cancelled");
        }
    }

    /// Sign and publish a message as the opening `SenderRequest` leg.
    pub async fn send(&self, message: Message) -> Result<()> {
        self.inner.send_payload(message.into_payload()).await
    }

    /// Cancel every consumer and close the broker connection.
    pub async fn close(&self) {
        let queues: Vec<String> = self.inner.consumers.lock().await.keys().cloned().collect();
        for queue in queues {
            self.cancel(&queue).await;
        }
        self.inner.conn.close().await;
    }
}

impl ProviderInner {
    async fn producer_for(&self, queue: &str) -> Result<Arc<dyn BrokerProducer>> {
        let mut producers = self.producers.lock().await;
        if let Some(producer) = producers.get(queue) {
            return Ok(Arc::clone(producer));
        }
        let producer: Arc<dyn BrokerProducer> = Arc::from(self.conn.open_producer(queue).await?);
        producers.insert(queue.to_string(), Arc::clone(&producer));
        Ok(producer)
    }

    async fn send_payload(&self, payload: MsgPayload) -> Result<()> {
        let queue = payload.send_queue_name()?.to_string();
        let bytes = self.codec.encode(&payload)?;
        let producer = self.producer_for(&queue).await?;
        let (exchange, _system, routing_key) = destroy_queue_name(&queue);

        let result = producer
            .publish(exchange, routing_key, routing_key, &bytes)
            .await;
        let status = if result.is_ok() { "success" } else { "error" };
        PUBLISH_TOTAL
            .with_label_values(&[&payload.message_type, status])
            .inc();
        result
    }

    async fn process(&self, queue: &str, bytes: &[u8]) {
        let payload = match self.codec.decode(bytes) {
            Ok(payload) => payload,
            Err(e) => {
                error!(queue = %queue, error = %e, "undecodable payload dropped");
                RECEIVE_TOTAL
                    .with_label_values(&["unknown", "decode_error"])
                    .inc();
                return;
            }
        };

        if !self.codec.verify(&payload) {
            warn!(
                queue = %queue,
                msg_id = %payload.msg_id,
                message_type = %payload.message_type,
                "signature mismatch, payload dropped"
            );
            RECEIVE_TOTAL
                .with_label_values(&[&payload.message_type, "bad_signature"])
                .inc();
            return;
        }

        debug!(
            queue = %queue,
            msg_id = %payload.msg_id,
            message_type = %payload.message_type,
            phase = payload.phase.as_str(),
            "payload received"
        );

        let start = Instant::now();
        match self.dispatcher.dispatch(&payload).await {
            Ok(Some(reply)) => {
                if let Err(e) = self.send_payload(reply).await {
                    error!(msg_id = %payload.msg_id, error = %e, "failed to publish reply");
                }
                RECEIVE_TOTAL
                    .with_label_values(&[&payload.message_type, "processed"])
                    .inc();
            }
            Ok(None) => {
                RECEIVE_TOTAL
                    .with_label_values(&[&payload.message_type, "processed"])
                    .inc();
            }
            Err(Error::UnregisteredType(message_type)) => {
                warn!(
                    queue = %queue,
                    message_type = %message_type,
                    "no processor registered, payload dropped"
                );
                RECEIVE_TOTAL
                    .with_label_values(&[&payload.message_type, "unregistered_type"])
                    .inc();
            }
            Err(e) => {
                error!(msg_id = %payload.msg_id, error = %e, "handler failed, payload dropped");
                RECEIVE_TOTAL
                    .with_label_values(&[&payload.message_type, "handler_error"])
                    .inc();
            }
        }
        PROCESS_DURATION
            .with_label_values(&[&payload.message_type])
            .observe(start.elapsed().as_secs_f64());
    }
}

/// Drain deliveries from one queue until its channel closes.
///
/// Each delivery is processed inside a panic recovery boundary and then
/// acknowledged unconditionally, so one poisonous message can never take
/// the loop down or wedge the queue.
async fn consume_loop(inner: Arc<ProviderInner>, queue: String, mut deliveries: DeliveryStream) {
    while let Some(delivery) = deliveries.recv().await {
        let (bytes, acker) = delivery.into_parts();
        let outcome = AssertUnwindSafe(inner.process(&queue, &bytes))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            error!(
                queue = %queue,
                panic = %panic_message(&panic),
                "handler panicked, payload dropped"
            );
            RECEIVE_TOTAL.with_label_values(&["unknown", "panic"]).inc();
        }
        acker.ack(false).await;
    }
    debug!(queue = %queue, "delivery channel closed, consume loop exiting");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
