//! Dispatch core
//!
//! Routes verified payloads to the processor registered for their type and
//! produces the next-phase reply payload when the protocol calls for one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::body::MessageBody;
use crate::payload::{MessageKind, MsgPayload, Phase};
use crate::{Error, Result};

/// Per-type application callback set.
///
/// Exactly one processor may be registered per message type per process.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Message type this processor handles
    fn message_type(&self) -> &str;

    /// Called with a new request. For simplex and duplex transactions a
    /// non-empty returned body becomes the recipient acknowledgment;
    /// notices never reply regardless of the return value.
    async fn on_received(&self, payload: &MsgPayload) -> Result<Option<MessageBody>>;

    /// Called on the original sender when the recipient acknowledges.
    /// For a duplex transaction a non-empty returned body becomes the
    /// final sender acknowledgment; for simplex it is discarded.
    async fn on_recipient_ack_received(
        &self,
        msg_id: &str,
        body: &MessageBody,
    ) -> Result<Option<MessageBody>>;

    /// Called with the terminal leg of a duplex transaction.
    async fn on_sender_ack_received(&self, msg_id: &str, body: &MessageBody) -> Result<()>;
}

/// Routes payloads by type and phase.
#[derive(Default)]
pub struct Dispatcher {
    processors: RwLock<HashMap<String, Arc<dyn MessageProcessor>>>,
}

impl Dispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor for its message type.
    ///
    /// A second registration for the same type replaces the first.
    pub async fn register(&self, processor: Arc<dyn MessageProcessor>) {
        let key = processor.message_type().to_string();
        let mut processors = self.processors.write().await;
        if processors.insert(key.clone(), processor).is_some() {
            warn!(message_type = %key, "replacing registered processor");
        }
    }

    async fn processor_for(&self, message_type: &str) -> Result<Arc<dyn MessageProcessor>> {
        self.processors
            .read()
            .await
            .get(message_type)
            .cloned()
            .ok_or_else(|| Error::UnregisteredType(message_type.to_string()))
    }

    /// Route a verified payload; returns the reply payload to publish, if
    /// the protocol has a further leg.
    pub async fn dispatch(&self, payload: &MsgPayload) -> Result<Option<MsgPayload>> {
        let processor = self.processor_for(&payload.message_type).await?;
        match payload.phase {
            Phase::SenderRequest => self.handle_new(payload, processor).await,
            Phase::RecipientAck => self.handle_recipient_ack(payload, processor).await,
            Phase::SenderAck => self.handle_sender_ack(payload, processor).await,
        }
    }

    async fn handle_new(
        &self,
        payload: &MsgPayload,
        processor: Arc<dyn MessageProcessor>,
    ) -> Result<Option<MsgPayload>> {
        let reply = processor
            .on_received(payload)
            .await
            .map_err(|e| Error::Handler(e.to_string()))?;

        // Notices never reply, whatever the processor returned.
        if payload.kind() == MessageKind::Notice {
            return Ok(None);
        }
        Ok(reply
            .filter(|body| !body.is_empty())
            .map(|body| payload.reply(Phase::RecipientAck, body)))
    }

    async fn handle_recipient_ack(
        &self,
        payload: &MsgPayload,
        processor: Arc<dyn MessageProcessor>,
    ) -> Result<Option<MsgPayload>> {
        let reply = processor
            .on_recipient_ack_received(&payload.msg_id, &payload.body)
            .await
            .map_err(|e| Error::Handler(e.to_string()))?;

        match payload.kind() {
            MessageKind::Duplex => Ok(reply
                .filter(|body| !body.is_empty())
                .map(|body| payload.reply(Phase::SenderAck, body))),
            _ => {
                if reply.is_some() {
                    debug!(msg_id = %payload.msg_id, "simplex transaction has no further leg; reply discarded");
                }
                Ok(None)
            }
        }
    }

    async fn handle_sender_ack(
        &self,
        payload: &MsgPayload,
        processor: Arc<dyn MessageProcessor>,
    ) -> Result<Option<MsgPayload>> {
        processor
            .on_sender_ack_received(&payload.msg_id, &payload.body)
            .await
            .map_err(|e| Error::Handler(e.to_string()))?;
        // Terminal leg, never a reply.
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProcessor {
        message_type: &'static str,
        on_received: Option<MessageBody>,
        on_recipient_ack: Option<MessageBody>,
    }

    #[async_trait]
    impl MessageProcessor for FixedProcessor {
        fn message_type(&self) -> &str {
            self.message_type
        }

        async fn on_received(&self, _payload: &MsgPayload) -> Result<Option<MessageBody>> {
            Ok(self.on_received.clone())
        }

        async fn on_recipient_ack_received(
            &self,
            _msg_id: &str,
            _body: &MessageBody,
        ) -> Result<Option<MessageBody>> {
            Ok(self.on_recipient_ack.clone())
        }

        async fn on_sender_ack_received(&self, _msg_id: &str, _body: &MessageBody) -> Result<()> {
            Ok(())
        }
    }

    struct FailingProcessor;

    #[async_trait]
    impl MessageProcessor for FailingProcessor {
        fn message_type(&self) -> &str {
            "failing"
        }

        async fn on_received(&self, _payload: &MsgPayload) -> Result<Option<MessageBody>> {
            Err(Error::Handler("application failure".to_string()))
        }

        async fn on_recipient_ack_received(
            &self,
            _msg_id: &str,
            _body: &MessageBody,
        ) -> Result<Option<MessageBody>> {
            Ok(None)
        }

        async fn on_sender_ack_received(&self, _msg_id: &str, _body: &MessageBody) -> Result<()> {
            Ok(())
        }
    }

    fn notice(message_type: &str) -> MsgPayload {
        MsgPayload {
            msg_id: "m1".to_string(),
            message_type: message_type.to_string(),
            phase: Phase::SenderRequest,
            body: MessageBody::new(),
            source: String::new(),
            destination_ack: String::new(),
            destination_new: "sys_amq_88880001".to_string(),
            signature: String::new(),
        }
    }

    fn simplex(phase: Phase) -> MsgPayload {
        MsgPayload {
            msg_id: "m2".to_string(),
            message_type: "test".to_string(),
            phase,
            body: MessageBody::new(),
            source: "sys_amq_99990001".to_string(),
            destination_ack: String::new(),
            destination_new: "sys_amq_88880001".to_string(),
            signature: String::new(),
        }
    }

    fn duplex(phase: Phase) -> MsgPayload {
        MsgPayload {
            msg_id: "m3".to_string(),
            message_type: "test".to_string(),
            phase,
            body: MessageBody::new(),
            source: "sys_amq_99990001".to_string(),
            destination_ack: "sys_amq_88880001".to_string(),
            destination_new: "sys_amq_99990001".to_string(),
            signature: String::new(),
        }
    }

    async fn dispatcher_with(processor: FixedProcessor) -> Dispatcher {
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(processor)).await;
        dispatcher
    }

    #[tokio::test]
    async fn test_notice_never_replies() {
        let dispatcher = dispatcher_with(FixedProcessor {
            message_type: "test",
            on_received: Some(MessageBody::new().add("ignored", "1")),
            on_recipient_ack: None,
        })
        .await;

        let reply = dispatcher.dispatch(&notice("test")).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_simplex_request_acknowledged_to_source() {
        let dispatcher = dispatcher_with(FixedProcessor {
            message_type: "test",
            on_received: Some(MessageBody::new().add("hi", "simplex")),
            on_recipient_ack: None,
        })
        .await;

        let reply = dispatcher
            .dispatch(&simplex(Phase::SenderRequest))
            .await
            .unwrap()
            .expect("simplex request must produce an ack");
        assert_eq!(reply.phase, Phase::RecipientAck);
        assert_eq!(reply.send_queue_name().unwrap(), "sys_amq_99990001");
        assert_eq!(reply.body.get("hi"), Some("simplex"));
    }

    #[tokio::test]
    async fn test_empty_return_produces_no_reply() {
        let dispatcher = dispatcher_with(FixedProcessor {
            message_type: "test",
            on_received: Some(MessageBody::new()),
            on_recipient_ack: None,
        })
        .await;

        let reply = dispatcher
            .dispatch(&simplex(Phase::SenderRequest))
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_simplex_ack_return_discarded() {
        let dispatcher = dispatcher_with(FixedProcessor {
            message_type: "test",
            on_received: None,
            on_recipient_ack: Some(MessageBody::new().add("late", "1")),
        })
        .await;

        let reply = dispatcher
            .dispatch(&simplex(Phase::RecipientAck))
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_duplex_recipient_ack_produces_sender_ack() {
        let dispatcher = dispatcher_with(FixedProcessor {
            message_type: "test",
            on_received: None,
            on_recipient_ack: Some(MessageBody::new().add("hello", "duplex")),
        })
        .await;

        let reply = dispatcher
            .dispatch(&duplex(Phase::RecipientAck))
            .await
            .unwrap()
            .expect("duplex ack with body must produce a sender ack");
        assert_eq!(reply.phase, Phase::SenderAck);
        assert_eq!(reply.send_queue_name().unwrap(), "sys_amq_88880001");
    }

    #[tokio::test]
    async fn test_sender_ack_is_terminal() {
        let dispatcher = dispatcher_with(FixedProcessor {
            message_type: "test",
            on_received: Some(MessageBody::new().add("x", "1")),
            on_recipient_ack: Some(MessageBody::new().add("y", "2")),
        })
        .await;

        let reply = dispatcher.dispatch(&duplex(Phase::SenderAck)).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_unregistered_type() {
        let dispatcher = Dispatcher::new();
        let result = dispatcher.dispatch(&notice("nobody")).await;
        assert!(matches!(result, Err(Error::UnregisteredType(_))));
    }

    #[tokio::test]
    async fn test_handler_error_is_surfaced() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(FailingProcessor)).await;
        let result = dispatcher.dispatch(&notice("failing")).await;
        assert!(matches!(result, Err(Error::Handler(_))));
    }
}
