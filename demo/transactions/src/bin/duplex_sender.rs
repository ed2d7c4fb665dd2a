//! Sends a duplex transaction to system 8888 every ten seconds and
//! answers the recipient acknowledgment with the final sender leg.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use amq_core::{
    new_msg_id, DuplexMessage, Message, MessageBody, MessageProcessor, MsgPayload, Node,
    Provider, SystemId,
};
use amq_demo_transactions::{connect, demo_config, init_tracing, RECEIVER_SYSTEM, SENDER_SYSTEM};

struct DuplexSender;

#[async_trait]
impl MessageProcessor for DuplexSender {
    fn message_type(&self) -> &str {
        "test-duplex"
    }

    async fn on_received(&self, _payload: &MsgPayload) -> amq_core::Result<Option<MessageBody>> {
        Ok(None)
    }

    async fn on_recipient_ack_received(
        &self,
        msg_id: &str,
        body: &MessageBody,
    ) -> amq_core::Result<Option<MessageBody>> {
        info!(msg_id = %msg_id, hi = body.get("hi").unwrap_or(""), "recipient acknowledged");
        Ok(Some(MessageBody::new().add("hello", "duplex")))
    }

    async fn on_sender_ack_received(&self, _msg_id: &str, _body: &MessageBody) -> amq_core::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = demo_config()?;
    let conn = connect(&config).await?;
    let provider = Provider::new(
        conn,
        SystemId::new(SENDER_SYSTEM)?,
        Node::BIZ,
        &config.secret,
    );
    provider.register(Arc::new(DuplexSender)).await;
    let shutdown = provider.start(&[]).await?;

    let own_queue = provider.own_queue_name(None);
    let recipient_queue = provider.queue_name(&SystemId::new(RECEIVER_SYSTEM)?);

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let msg_id = new_msg_id();
                info!(msg_id = %msg_id, "sending duplex request");
                provider
                    .send(Message::from(
                        DuplexMessage::new(msg_id, "test-duplex")
                            .with_body(MessageBody::new().add("hello", "world"))
                            .with_source(&own_queue)
                            .with_destination_ack(&recipient_queue)
                            .with_destination_new(&own_queue),
                    ))
                    .await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    shutdown.shutdown().await;
    Ok(())
}
