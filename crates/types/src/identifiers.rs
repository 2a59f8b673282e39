//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mock node identifier.
///
/// Ids are signed so that a test can force a negative id and observe the
/// messaging layer reject it. Only non-negative ids are valid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub i32);

impl NodeId {
    /// Whether this id can be used to register a messaging endpoint.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Get the raw value.
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Position of a node in the orchestrator's registry.
///
/// Unlike [`NodeId`], an index is always unique: forced ids may collide but
/// every constructed node gets its own slot.
pub type NodeIndex = usize;

static NEXT_NETWORK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one mock network instance.
///
/// Distinguishes storage namespaces of independently constructed networks
/// running in the same process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub u64);

impl NetworkId {
    /// Allocate a network id that no other network in this process has.
    pub fn unique() -> Self {
        NetworkId(NEXT_NETWORK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
