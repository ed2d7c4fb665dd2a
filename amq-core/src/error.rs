//! Error types for the messaging layer

use thiserror::Error;

/// Result type for AMQ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Messaging layer errors
#[derive(Error, Debug)]
pub enum Error {
    /// Broker unreachable or connection setup failed (fatal at startup)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Payload could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Malformed wire payload (message dropped, delivery still acked)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Integrity digest did not match (message dropped silently)
    #[error("Signature mismatch for message {0}")]
    SignatureMismatch(String),

    /// No processor registered for the message type
    #[error("No processor registered for type: {0}")]
    UnregisteredType(String),

    /// Required address missing for the current phase
    #[error("Routing error: {0}")]
    Routing(String),

    /// Broker-side publish failure (surfaced to the caller, no retry)
    #[error("Publish error: {0}")]
    Publish(String),

    /// Broker-side consumer setup failure
    #[error("Consumer open error: {0}")]
    ConsumerOpen(String),

    /// Application processor returned an error
    #[error("Processor error: {0}")]
    Handler(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// System id is not exactly four ASCII digits
    #[error("Invalid system id: {0}")]
    InvalidSystemId(String),
}
