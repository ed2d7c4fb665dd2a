//! Payload codec
//!
//! Serializes the wire envelope and stamps/verifies its integrity
//! signature. Encoding always signs; decoding never verifies on its own,
//! the consume path calls [`Codec::verify`] before dispatching.

use crate::payload::MsgPayload;
use crate::sign::Signer;
use crate::{Error, Result};

/// Encoder/decoder for signed wire payloads.
#[derive(Debug, Clone)]
pub struct Codec {
    signer: Signer,
}

impl Codec {
    /// Create a codec signing with the given signer
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    /// Compute the signature over all other fields, then serialize.
    pub fn encode(&self, payload: &MsgPayload) -> Result<Vec<u8>> {
        let mut signed = payload.clone();
        signed.signature = self.signer.signature(payload);
        serde_json::to_vec(&signed).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Deserialize a payload from raw bytes.
    pub fn decode(&self, bytes: &[u8]) -> Result<MsgPayload> {
        serde_json::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Recompute the digest and compare against the carried signature.
    pub fn verify(&self, payload: &MsgPayload) -> bool {
        self.signer.verify(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::MessageBody;
    use crate::payload::Phase;

    fn codec() -> Codec {
        Codec::new(Signer::new("secret"))
    }

    fn sample() -> MsgPayload {
        MsgPayload {
            msg_id: "m1".to_string(),
            message_type: "test".to_string(),
            phase: Phase::SenderRequest,
            body: MessageBody::new().add("hello", "world").add("index", "1"),
            source: "sys_amq_99990001".to_string(),
            destination_ack: String::new(),
            destination_new: "sys_amq_88880001".to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        let bytes = codec.encode(&sample()).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        let mut expected = sample();
        expected.signature = decoded.signature.clone();
        assert_eq!(decoded, expected);
        assert!(codec.verify(&decoded));
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let codec = codec();
        let bytes = codec.encode(&sample()).unwrap();
        let mut decoded = codec.decode(&bytes).unwrap();
        decoded.body = MessageBody::new().add("hello", "forged").add("index", "1");
        assert!(!codec.verify(&decoded));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = codec();
        assert!(matches!(
            codec.decode(b"not json"),
            Err(crate::Error::Decode(_))
        ));
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let bytes = codec().encode(&sample()).unwrap();
        let other = Codec::new(Signer::new("other-secret"));
        let decoded = other.decode(&bytes).unwrap();
        assert!(!other.verify(&decoded));
    }
}
