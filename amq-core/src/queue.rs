//! Queue-name addressing
//!
//! An AMQ queue name encodes the routing address of a logical node:
//! `sys_amq_{systemId}{node}` or `sys_amq_{systemId}{node}_p{partition}`,
//! where `{systemId}` is the four-digit id of the target system and
//! `{node}` the four-digit id of the AMQ node it listens on. All queues
//! bind to one shared direct exchange; the routing key equals the queue
//! name minus the exchange prefix.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Direct exchange shared by every AMQ queue.
pub const EXCHANGE: &str = "sys_amq";

// Length of the "sys_amq_" prefix; the system id occupies [8, 12).
const SYSTEM_ID_OFFSET: usize = 8;

/// Four-digit numeric system identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SystemId(String);

impl SystemId {
    /// Validate and wrap a system id; it must be exactly four ASCII digits.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.len() == 4 && id.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(id))
        } else {
            Err(Error::InvalidSystemId(id))
        }
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SystemId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SystemId> for String {
    fn from(id: SystemId) -> Self {
        id.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical AMQ node of a system, rendered as four digits in queue names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node(pub u16);

impl Node {
    /// Business node, the default listening node of a system.
    pub const BIZ: Node = Node(1);
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Build the queue name addressing `system_id`'s `node`.
pub fn build_queue_name(system_id: &SystemId, node: Node) -> String {
    format!("{}_{}{}", EXCHANGE, system_id, node)
}

/// Build the queue name for one partition of `system_id`'s `node`.
pub fn partitioned_queue_name(system_id: &SystemId, node: Node, partition: u32) -> String {
    format!("{}_{}{}_p{}", EXCHANGE, system_id, node, partition)
}

/// Decompose a queue name into `(exchange, system segment, routing key)`.
///
/// A name shorter than twelve characters is a programming error, not a
/// recoverable condition.
pub fn destroy_queue_name(name: &str) -> (&'static str, &str, &str) {
    assert!(
        name.len() >= SYSTEM_ID_OFFSET + 4,
        "malformed queue name: {name}"
    );
    (
        EXCHANGE,
        &name[SYSTEM_ID_OFFSET..SYSTEM_ID_OFFSET + 4],
        &name[SYSTEM_ID_OFFSET..],
    )
}
