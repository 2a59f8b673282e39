//! Core types for the mock network.
//!
//! This crate provides the foundational types used throughout the harness:
//!
//! - **Identifiers**: NodeId, NodeIndex, NetworkId
//! - **Addresses**: PeerAddress, MessageRecipient
//! - **Services**: ServiceKind, ServiceInfo, ServiceEntry, ServiceKeyOverrides
//! - **Identity**: KeyPair, PublicKey, Party, NodeInfo
//!
//! It does not depend on any other workspace crates.

mod address;
mod crypto;
mod identifiers;
mod identity;
mod service;

pub use address::{MessageRecipient, PeerAddress};
pub use crypto::{dummy_notary_key, KeyPair, PublicKey, Signature, DUMMY_NOTARY_ENTROPY};
pub use identifiers::{NetworkId, NodeId, NodeIndex};
pub use identity::{NodeInfo, Party};
pub use service::{OverrideError, ServiceEntry, ServiceInfo, ServiceKeyOverrides, ServiceKind};
