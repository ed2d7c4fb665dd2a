//! Transactional messaging layer over a publish/consume broker
//!
//! Gives application code three delivery semantics while hiding broker
//! connection, exchange and queue mechanics behind a uniform send/listen
//! contract:
//! - **Notice** — fire-and-forget, no acknowledgment expected
//! - **Simplex** — one-phase transaction, acknowledged by the recipient
//! - **Duplex** — two-phase transaction, acknowledged by both sides
//!
//! The broker itself is an external collaborator behind the narrow traits in
//! [`broker`]; the `amq-nats` crate binds them to NATS and
//! [`memory::MemoryBroker`] keeps everything in process for tests and
//! local runs.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod body;
pub mod broker;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod payload;
pub mod provider;
pub mod queue;
pub mod sign;

pub use body::MessageBody;
pub use codec::Codec;
pub use config::AmqConfig;
pub use dispatch::{Dispatcher, MessageProcessor};
pub use error::{Error, Result};
pub use message::{new_msg_id, DuplexMessage, Message, NoticeMessage, SimplexMessage};
pub use payload::{MessageKind, MsgPayload, Phase};
pub use provider::{Listener, Provider, Shutdown};
pub use queue::{
    build_queue_name, destroy_queue_name, partitioned_queue_name, Node, SystemId, EXCHANGE,
};
pub use sign::Signer;
