//! Sends a fire-and-forget notice to system 8888 every ten seconds.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use amq_core::{new_msg_id, Message, MessageBody, Node, NoticeMessage, Provider, SystemId};
use amq_demo_transactions::{connect, demo_config, init_tracing, RECEIVER_SYSTEM, SENDER_SYSTEM};

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
    let destination = provider.queue_name(&SystemId::new(RECEIVER_SYSTEM)?);

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let msg_id = new_msg_id();
                info!(msg_id = %msg_id, "sending notice");
                provider
                    .send(Message::from(
                        NoticeMessage::new(msg_id, "test-notice")
                            .with_body(MessageBody::new().add("hello", "world"))
                            .with_destination(&destination),
                    ))
                    .await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    provider.close().await;
    Ok(())
}
