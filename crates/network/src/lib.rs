//! In-memory messaging for mock nodes.
//!
//! [`InMemoryMessagingNetwork`] owns one FIFO inbox per registered address and
//! routes messages between them without sockets. Each node talks to it
//! through an [`InMemoryEndpoint`]:
//!
//! - **Send side**: routed on `send`, or queued for
//!   [`InMemoryMessagingNetwork::pump_send`] when sends are manually pumped
//! - **Receive side**: delivered by [`InMemoryEndpoint::pump_receive`], or by a
//!   per-endpoint receive thread in thread-per-node mode
//!
//! Messages addressed to a service go to one of its running providers,
//! chosen by the configured [`ServicePeerAllocationStrategy`].

mod allocation;
mod endpoint;
mod error;
mod fabric;

pub use allocation::ServicePeerAllocationStrategy;
pub use endpoint::InMemoryEndpoint;
pub use error::NetworkError;
pub use fabric::{FabricStats, InMemoryMessagingNetwork, MessagingConfig};
