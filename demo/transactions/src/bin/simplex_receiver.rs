//! Listens as system 8888 and acknowledges every simplex request.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use amq_core::{MessageBody, MessageProcessor, MsgPayload, Node, Provider, SystemId};
use amq_demo_transactions::{connect, demo_config, init_tracing, RECEIVER_SYSTEM};

struct SimplexReceiver;

#[async_trait]
impl MessageProcessor for SimplexReceiver {
    fn message_type(&self) -> &str {
        "test-simplex"
    }

    async fn on_received(&self, payload: &MsgPayload) -> amq_core::Result<Option<MessageBody>> {
        info!(
            msg_id = %payload.msg_id,
            hello = payload.body.get("hello").unwrap_or(""),
            "simplex request received"
        );
        Ok(Some(MessageBody::new().add("hi", "simplex")))
    }

    async fn on_recipient_ack_received(
        &self,
        _msg_id: &str,
        _body: &MessageBody,
    ) -> amq_core::Result<Option<MessageBody>> {
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
        SystemId::new(RECEIVER_SYSTEM)?,
        Node::BIZ,
        &config.secret,
    );
    provider.register(Arc::new(SimplexReceiver)).await;
    let shutdown = provider.start(&[]).await?;

    tokio::signal::ctrl_c().await?;
    shutdown.shutdown().await;
    Ok(())
}
