use mocknet_core::ReadinessError;
use mocknet_dispatch::WorkerError;
use mocknet_network::NetworkError;
use mocknet_types::{MessageRecipient, NodeId, OverrideError};
use thiserror::Error;

/// Errors raised by a single mock node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("messaging setup failed: {0}")]
    Messaging(#[from] NetworkError),

    #[error("node executor unavailable: {0}")]
    Worker(#[from] WorkerError),

    #[error("invalid service key override: {0}")]
    Override(#[from] OverrideError),

    #[error("{0} is not started")]
    NotStarted(NodeId),

    #[error("network map registration of {node} failed: {source}")]
    Registration {
        node: NodeId,
        source: ReadinessError,
    },

    #[error("BFT replica on {node} failed to initialize: {source}")]
    ReplicaInit {
        node: NodeId,
        source: ReadinessError,
    },
}

/// Errors raised by the [`MockNetwork`](crate::MockNetwork) orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockNetworkError {
    #[error("network sends are manually pumped; route them with pump_send first")]
    SendManuallyPumped,

    #[error("node registry must be empty, found {0} nodes")]
    RegistryNotEmpty(usize),

    #[error("unable to resolve {0} to a node")]
    UnresolvedAddress(MessageRecipient),

    #[error("unable to enumerate all nodes in BFT cluster: expected {expected}, found {found}")]
    ClusterMismatch { expected: usize, found: usize },

    #[error("cluster member {0} runs no BFT replica")]
    MissingReplica(NodeId),

    #[error("cluster member {0} was never started")]
    ReplicaNotStarted(NodeId),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Messaging(#[from] NetworkError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}
