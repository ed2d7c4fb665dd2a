//! Payload integrity signing

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::payload::MsgPayload;

type HmacSha256 = Hmac<Sha256>;

/// Computes and verifies the HMAC-SHA256 integrity digest shared by both
/// ends of a transaction.
#[derive(Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    /// Create a signer over the shared secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex digest over every field except the signature itself.
    ///
    /// The input is a fixed field order plus the body in insertion order,
    /// so both ends compute the same digest for the same payload.
    pub fn signature(&self, payload: &MsgPayload) -> String {
        // HMAC accepts keys of any length.
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("hmac key length");
        mac.update(payload.msg_id.as_bytes());
        mac.update(b"|");
        mac.update(payload.message_type.as_bytes());
        mac.update(b"|");
        mac.update(payload.phase.as_str().as_bytes());
        mac.update(b"|");
        mac.update(payload.source.as_bytes());
        mac.update(b"|");
        mac.update(payload.destination_ack.as_bytes());
        mac.update(b"|");
        mac.update(payload.destination_new.as_bytes());
        for (key, value) in payload.body.iter() {
            mac.update(b"|");
            mac.update(key.as_bytes());
            mac.update(b"=");
            mac.update(value.as_bytes());
        }
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recompute the digest and compare against the carried signature
    pub fn verify(&self, payload: &MsgPayload) -> bool {
        self.signature(payload) == payload.signature
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signer(..)")
    }
}
