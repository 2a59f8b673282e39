//! Deterministic in-memory mock network.
//!
//! This crate simulates a small network of ledger nodes inside one process,
//! with no sockets and no disks, so multi-node protocols can be exercised and
//! replayed from unit tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      MockNetwork                        │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     nodes: Vec<MockNode> (creation order)          │ │
//! │  │     built by a NodeFactory, each holding only a    │ │
//! │  │     NetworkContext                                 │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │ run_network: one message    │
//! │                           ▼ per node per round          │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     InMemoryMessagingNetwork                       │ │
//! │  │     one FIFO inbox per address                     │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     SharedWorker: handlers of every node run here, │ │
//! │  │     torn down when the last node lets go of it     │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! With `thread_per_node` each node instead gets a private worker and a
//! receive thread, and [`MockNetwork::wait_quiescent`] replaces pumping.

mod cluster;
mod config;
mod error;
mod factory;
mod fs;
mod network;
mod node;
mod services;
mod topology;

pub use cluster::BFT_CLUSTER_SERVICE_NAME;
pub use config::{MockNetworkConfig, NodeConfig, NodeParams};
pub use error::{MockNetworkError, NodeError};
pub use factory::{CustomizingFactory, DefaultFactory, MockNodeArgs, NodeCustomizer, NodeFactory};
pub use fs::InMemoryFs;
pub use network::MockNetwork;
pub use node::{MockNode, NetworkContext};
pub use services::{
    BftReplica, IdentityService, KeyManagementService, NetworkMapService, RegistrationResponse,
    NETWORK_MAP_ACK_TOPIC, NETWORK_MAP_REGISTER_TOPIC,
};
pub use topology::BasketOfNodes;
