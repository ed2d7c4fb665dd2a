//! Typed message kinds
//!
//! Applications build one of three message kinds; the transaction model
//! wraps it into a wire payload carrying the initial `SenderRequest`
//! phase and the addresses every later leg routes by.

use uuid::Uuid;

use crate::body::MessageBody;
use crate::payload::{MsgPayload, Phase};

/// Generate a sortable, globally unique message id.
pub fn new_msg_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Fire-and-forget notification; delivery to the broker is the only
/// guarantee, no acknowledgment ever flows back.
#[derive(Debug, Clone)]
pub struct NoticeMessage {
    /// Unique message id
    pub id: String,
    /// Handler selector on the receiving side
    pub message_type: String,
    /// Application data
    pub body: MessageBody,
    /// Queue the notice is published to
    pub destination: String,
}

impl NoticeMessage {
    /// Create a notice with an empty body and no destination
    pub fn new(id: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message_type: message_type.into(),
            body: MessageBody::new(),
            destination: String::new(),
        }
    }

    /// Set the body
    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.body = body;
        self
    }

    /// Set the destination queue
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }
}

/// One-phase transaction: the recipient acknowledges back to `source`
/// and the protocol terminates there.
#[derive(Debug, Clone)]
pub struct SimplexMessage {
    /// Unique message id
    pub id: String,
    /// Handler selector on the receiving side
    pub message_type: String,
    /// Application data
    pub body: MessageBody,
    /// Queue the acknowledgment is sent back to
    pub source: String,
    /// Queue the request is published to
    pub destination: String,
}

impl SimplexMessage {
    /// Create a simplex message with an empty body and no addresses
    pub fn new(id: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message_type: message_type.into(),
            body: MessageBody::new(),
            source: String::new(),
            destination: String::new(),
        }
    }

    /// Set the body
    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.body = body;
        self
    }

    /// Set the sender's queue, where the acknowledgment arrives
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the destination queue
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }
}

/// Two-phase transaction: the recipient acknowledges to
/// `destination_new`, and the sender's final acknowledgment goes to
/// `destination_ack`.
#[derive(Debug, Clone)]
pub struct DuplexMessage {
    /// Unique message id
    pub id: String,
    /// Handler selector on the receiving side
    pub message_type: String,
    /// Application data
    pub body: MessageBody,
    /// Queue name identifying the sending side
    pub source: String,
    /// Recipient queue: receives the request and the final sender ack
    pub destination_ack: String,
    /// Sender-side queue the recipient acknowledgment is sent to
    pub destination_new: String,
}

impl DuplexMessage {
    /// Create a duplex message with an empty body and no addresses
    pub fn new(id: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message_type: message_type.into(),
            body: MessageBody::new(),
            source: String::new(),
            destination_ack: String::new(),
            destination_new: String::new(),
        }
    }

    /// Set the body
    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.body = body;
        self
    }

    /// Set the sender's queue name
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the recipient queue receiving the request and the final ack
    pub fn with_destination_ack(mut self, destination_ack: impl Into<String>) -> Self {
        self.destination_ack = destination_ack.into();
        self
    }

    /// Set the sender-side queue receiving the recipient acknowledgment
    pub fn with_destination_new(mut self, destination_new: impl Into<String>) -> Self {
        self.destination_new = destination_new.into();
        self
    }
}

/// The three delivery semantics offered by the layer.
#[derive(Debug, Clone)]
pub enum Message {
    /// Fire-and-forget
    Notice(NoticeMessage),
    /// One-phase transaction
    Simplex(SimplexMessage),
    /// Two-phase transaction
    Duplex(DuplexMessage),
}

impl Message {
    /// The unique message id
    pub fn msg_id(&self) -> &str {
        match self {
            Message::Notice(m) => &m.id,
            Message::Simplex(m) => &m.id,
            Message::Duplex(m) => &m.id,
        }
    }

    /// Wrap into a wire payload with the initial `SenderRequest` phase.
    pub fn into_payload(self) -> MsgPayload {
        match self {
            Message::Notice(m) => MsgPayload {
                msg_id: m.id,
                message_type: m.message_type,
                phase: Phase::SenderRequest,
                body: m.body,
                source: String::new(),
                destination_ack: String::new(),
                destination_new: m.destination,
                signature: String::new(),
            },
            Message::Simplex(m) => MsgPayload {
                msg_id: m.id,
                message_type: m.message_type,
                phase: Phase::SenderRequest,
                body: m.body,
                source: m.source,
                destination_ack: String::new(),
                destination_new: m.destination,
                signature: String::new(),
            },
            Message::Duplex(m) => MsgPayload {
                msg_id: m.id,
                message_type: m.message_type,
                phase: Phase::SenderRequest,
                body: m.body,
                source: m.source,
                destination_ack: m.destination_ack,
                destination_new: m.destination_new,
                signature: String::new(),
            },
        }
    }
}

impl From<NoticeMessage> for Message {
    fn from(m: NoticeMessage) -> Self {
        Message::Notice(m)
    }
}

impl From<SimplexMessage> for Message {
    fn from(m: SimplexMessage) -> Self {
        Message::Simplex(m)
    }
}

impl From<DuplexMessage> for Message {
    fn from(m: DuplexMessage) -> Self {
        Message::Duplex(m)
    }
}
