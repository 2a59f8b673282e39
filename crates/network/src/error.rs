use mocknet_dispatch::WorkerError;
use mocknet_types::{NodeId, PeerAddress, ServiceInfo};
use thiserror::Error;

/// Errors raised by the messaging fabric and its endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("invalid node id {0}: ids must be non-negative")]
    InvalidNodeId(NodeId),

    #[error("address {0} already has a running endpoint")]
    AddressInUse(PeerAddress),

    #[error("no endpoint registered at {0}")]
    UnknownPeer(PeerAddress),

    #[error("no running endpoint advertises service {0}")]
    NoServiceProvider(ServiceInfo),

    #[error("endpoint {0} is stopped")]
    EndpointStopped(PeerAddress),

    #[error("node executor failed: {0}")]
    Worker(#[from] WorkerError),
}
