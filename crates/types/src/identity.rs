//! Parties and the information a node publishes about itself.

use crate::{PeerAddress, PublicKey, ServiceEntry, ServiceInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named identity backed by a public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: PublicKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}..)", self.name, self.owning_key.short_hex())
    }
}

/// Everything other nodes learn about a started node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub address: PeerAddress,
    pub legal_identity: Party,
    pub advertised_services: Vec<ServiceEntry>,
}

impl NodeInfo {
    /// Whether the node advertises a service descriptor.
    pub fn advertises(&self, info: &ServiceInfo) -> bool {
        self.advertised_services.iter().any(|entry| &entry.info == info)
    }

    /// The identity behind an advertised service descriptor.
    pub fn service_identity(&self, info: &ServiceInfo) -> Option<&Party> {
        self.advertised_services
            .iter()
            .find(|entry| &entry.info == info)
            .map(|entry| &entry.identity)
    }

    /// Whether the key is the legal identity key or any service identity key.
    pub fn owns_key(&self, key: &PublicKey) -> bool {
        self.legal_identity.owning_key == *key
            || self
                .advertised_services
                .iter()
                .any(|entry| entry.identity.owning_key == *key)
    }
}
