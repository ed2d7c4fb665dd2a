//! Sends a simplex transaction to system 8888 every ten seconds and logs
//! the recipient acknowledgment.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use amq_core::{
    new_msg_id, Message, MessageBody, MessageProcessor, MsgPayload, Node, Provider,
    SimplexMessage, SystemId,
};
use amq_demo_transactions::{connect, demo_config, init_tracing, RECEIVER_SYSTEM, SENDER_SYSTEM};

struct SimplexSender;

#[async_trait]
impl MessageProcessor for SimplexSender {
    fn message_type(&self) -> &str {
        "test-simplex"
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
        Ok(None)
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
    provider.register(Arc::new(SimplexSender)).await;
    let shutdown = provider.start(&[]).await?;

    let source = provider.own_queue_name(None);
    let destination = provider.queue_name(&SystemId::new(RECEIVER_SYSTEM)?);

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let msg_id = new_msg_id();
                info!(msg_id = %msg_id, "sending simplex request");
                provider
                    .send(Message::from(
                        SimplexMessage::new(msg_id, "test-simplex")
                            .with_body(MessageBody::new().add("hello", "world"))
                            .with_source(&source)
                            .with_destination(&destination),
                    ))
                    .await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    shutdown.shutdown().await;
    Ok(())
}
