//! Message recipients.

use crate::{NodeId, ServiceInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-to-point address of one messaging endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PeerAddress {
    pub id: NodeId,
}

impl PeerAddress {
    /// Address of the endpoint registered for a node id.
    pub fn new(id: NodeId) -> Self {
        Self { id }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock-node-{}", self.id.0)
    }
}

/// Where a message is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRecipient {
    /// One specific endpoint.
    Peer(PeerAddress),
    /// Any endpoint advertising the service; the fabric's allocation
    /// strategy picks the concrete peer.
    Service(ServiceInfo),
}

impl From<PeerAddress> for MessageRecipient {
    fn from(address: PeerAddress) -> Self {
        MessageRecipient::Peer(address)
    }
}

impl From<ServiceInfo> for MessageRecipient {
    fn from(info: ServiceInfo) -> Self {
        MessageRecipient::Service(info)
    }
}

impl fmt::Display for MessageRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRecipient::Peer(address) => write!(f, "{address}"),
            MessageRecipient::Service(info) => write!(f, "service({info})"),
        }
    }
}
