//! Wire-level message envelope

use serde::{Deserialize, Serialize};

use crate::body::MessageBody;
use crate::{Error, Result};

/// Transaction phase of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// A new request from the sending side
    SenderRequest,
    /// The recipient's acknowledgment of a request
    RecipientAck,
    /// The sender's final acknowledgment of a duplex transaction
    SenderAck,
}

impl Phase {
    /// Wire string, also part of the signing input
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::SenderRequest => "SENDER_REQUEST",
            Phase::RecipientAck => "RECIPIENT_ACK",
            Phase::SenderAck => "SENDER_ACK",
        }
    }
}

/// Logical kind of a payload.
///
/// Kind is not carried on the wire; it is inferred from which address
/// fields are populated: no `source` is a notice, a populated
/// `destinationAck` is a duplex transaction, anything else is simplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Fire-and-forget
    Notice,
    /// One-phase transaction
    Simplex,
    /// Two-phase transaction
    Duplex,
}

/// Wire envelope for all AMQ traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MsgPayload {
    /// Globally unique message id, stable across all legs of a transaction
    pub msg_id: String,

    /// Application-defined handler selector
    #[serde(rename = "type")]
    pub message_type: String,

    /// Current transaction phase
    pub phase: Phase,

    /// Application data
    #[serde(default)]
    pub body: MessageBody,

    /// Queue name of the sending side (empty for notices)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Queue name receiving requests and the final sender acknowledgment
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_ack: String,

    /// Queue name receiving new requests (notice/simplex) or the
    /// recipient acknowledgment (duplex)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_new: String,

    /// Integrity digest over every other field
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

impl MsgPayload {
    /// Infer the logical kind from the populated address fields.
    pub fn kind(&self) -> MessageKind {
        if self.source.is_empty() {
            MessageKind::Notice
        } else if !self.destination_ack.is_empty() {
            MessageKind::Duplex
        } else {
            MessageKind::Simplex
        }
    }

    /// Queue this payload must be published to in its current phase.
    ///
    /// | kind    | request          | recipient ack    | sender ack       |
    /// |---------|------------------|------------------|------------------|
    /// | notice  | `destinationNew` | —                | —                |
    /// | simplex | `destinationNew` | `source`         | —                |
    /// | duplex  | `destinationAck` | `destinationNew` | `destinationAck` |
    pub fn send_queue_name(&self) -> Result<&str> {
        let name = match self.phase {
            Phase::SenderRequest => match self.kind() {
                MessageKind::Duplex => &self.destination_ack,
                MessageKind::Notice | MessageKind::Simplex => &self.destination_new,
            },
            Phase::RecipientAck => match self.kind() {
                MessageKind::Duplex => &self.destination_new,
                MessageKind::Notice | MessageKind::Simplex => &self.source,
            },
            Phase::SenderAck => &self.destination_ack,
        };
        if name.is_empty() {
            Err(Error::Routing(format!(
                "message {} has no destination for phase {}",
                self.msg_id,
                self.phase.as_str()
            )))
        } else {
            Ok(name)
        }
    }

    /// Build the next-phase reply, preserving id, type and addressing.
    pub fn reply(&self, phase: Phase, body: MessageBody) -> MsgPayload {
        MsgPayload {
            msg_id: self.msg_id.clone(),
            message_type: self.message_type.clone(),
            phase,
            body,
            source: self.source.clone(),
            destination_ack: self.destination_ack.clone(),
            destination_new: self.destination_new.clone(),
            signature: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(phase: Phase, source: &str, ack: &str, new: &str) -> MsgPayload {
        MsgPayload {
            msg_id: "m1".to_string(),
            message_type: "test".to_string(),
            phase,
            body: MessageBody::new(),
            source: source.to_string(),
            destination_ack: ack.to_string(),
            destination_new: new.to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_kind_inference() {
        assert_eq!(
            payload(Phase::SenderRequest, "", "", "q").kind(),
            MessageKind::Notice
        );
        assert_eq!(
            payload(Phase::SenderRequest, "s", "", "q").kind(),
            MessageKind::Simplex
        );
        assert_eq!(
            payload(Phase::SenderRequest, "s", "a", "q").kind(),
            MessageKind::Duplex
        );
    }

    #[test]
    fn test_request_routing() {
        let notice = payload(Phase::SenderRequest, "", "", "sys_amq_88880001");
        assert_eq!(notice.send_queue_name().unwrap(), "sys_amq_88880001");

        let simplex = payload(Phase::SenderRequest, "sys_amq_99990001", "", "sys_amq_88880001");
        assert_eq!(simplex.send_queue_name().unwrap(), "sys_amq_88880001");

        let duplex = payload(
            Phase::SenderRequest,
            "sys_amq_99990001",
            "sys_amq_88880001",
            "sys_amq_99990001",
        );
        assert_eq!(duplex.send_queue_name().unwrap(), "sys_amq_88880001");
    }

    #[test]
    fn test_ack_routing() {
        let simplex = payload(Phase::RecipientAck, "sys_amq_99990001", "", "sys_amq_88880001");
        assert_eq!(simplex.send_queue_name().unwrap(), "sys_amq_99990001");

        let duplex = payload(
            Phase::RecipientAck,
            "sys_amq_99990001",
            "sys_amq_88880001",
            "sys_amq_99990001",
        );
        assert_eq!(duplex.send_queue_name().unwrap(), "sys_amq_99990001");

        let sender_ack = payload(
            Phase::SenderAck,
            "sys_amq_99990001",
            "sys_amq_88880001",
            "sys_amq_99990001",
        );
        assert_eq!(sender_ack.send_queue_name().unwrap(), "sys_amq_88880001");
    }

    #[test]
    fn test_missing_address_is_routing_error() {
        let broken = payload(Phase::SenderAck, "sys_amq_99990001", "", "");
        assert!(matches!(
            broken.send_queue_name(),
            Err(crate::Error::Routing(_))
        ));
    }

    #[test]
    fn test_reply_preserves_identity_and_addresses() {
        let request = payload(
            Phase::SenderRequest,
            "sys_amq_99990001",
            "sys_amq_88880001",
            "sys_amq_99990001",
        );
        let reply = request.reply(Phase::RecipientAck, MessageBody::new().add("ok", "1"));
        assert_eq!(reply.msg_id, request.msg_id);
        assert_eq!(reply.message_type, request.message_type);
        assert_eq!(reply.phase, Phase::RecipientAck);
        assert_eq!(reply.source, request.source);
        assert_eq!(reply.destination_ack, request.destination_ack);
        assert_eq!(reply.destination_new, request.destination_new);
        assert!(reply.signature.is_empty());
    }

    #[test]
    fn test_wire_field_names() {
        let duplex = payload(
            Phase::SenderRequest,
            "sys_amq_99990001",
            "sys_amq_88880001",
            "sys_amq_99990001",
        );
        let json = serde_json::to_string(&duplex).unwrap();
        assert!(json.contains("\"msgId\""));
        assert!(json.contains("\"type\""));
        assert!(json.contains("\"SENDER_REQUEST\""));
        assert!(json.contains("\"destinationAck\""));
        assert!(json.contains("\"destinationNew\""));
    }
}
