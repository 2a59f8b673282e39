//! Configuration for the mock network and its nodes.

use crate::NodeFactory;
use mocknet_network::ServicePeerAllocationStrategy;
use mocknet_types::{
    NetworkId, NodeId, PeerAddress, ServiceInfo, ServiceKeyOverrides, ServiceKind,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a [`MockNetwork`](crate::MockNetwork).
#[derive(Debug, Clone)]
pub struct MockNetworkConfig {
    /// Queue sends until [`MockNetwork::pump_send`](crate::MockNetwork::pump_send)
    /// routes them. Incompatible with `run_network`.
    pub network_send_manually_pumped: bool,
    /// Give every node its own worker and receive thread instead of the
    /// shared worker.
    pub thread_per_node: bool,
    /// How service-addressed messages pick a provider.
    pub allocation: ServicePeerAllocationStrategy,
    /// Seed for default entropy roots and random peer allocation.
    pub seed: u64,
}

impl Default for MockNetworkConfig {
    fn default() -> Self {
        Self {
            network_send_manually_pumped: false,
            thread_per_node: false,
            allocation: ServicePeerAllocationStrategy::Random,
            seed: 0,
        }
    }
}

impl MockNetworkConfig {
    pub fn with_network_send_manually_pumped(mut self, manual: bool) -> Self {
        self.network_send_manually_pumped = manual;
        self
    }

    pub fn with_thread_per_node(mut self, thread_per_node: bool) -> Self {
        self.thread_per_node = thread_per_node;
        self
    }

    pub fn with_allocation(mut self, allocation: ServicePeerAllocationStrategy) -> Self {
        self.allocation = allocation;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Per-node configuration, derived from the node id and network id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Root of the node's directory in the network's in-memory filesystem.
    pub base_directory: PathBuf,
    pub legal_name: String,
    /// Name of the node's in-memory database, scoped to the network.
    pub data_source_name: String,
    /// Replica id within a BFT notary cluster.
    pub bft_replica_id: Option<u32>,
    /// Every member of this node's BFT notary cluster.
    pub notary_cluster_addresses: Vec<PeerAddress>,
}

impl NodeConfig {
    /// Configuration with the default layout for node `id`.
    pub fn new(id: NodeId, network_id: NetworkId, legal_name: Option<String>) -> Self {
        Self {
            base_directory: PathBuf::from(format!("/nodes/{}", id.get())),
            legal_name: legal_name.unwrap_or_else(|| format!("Mock Company {}", id.get())),
            data_source_name: format!("node_{}_net_{}", id.get(), network_id),
            bft_replica_id: None,
            notary_cluster_addresses: Vec::new(),
        }
    }

    /// Make this node replica `replica_id` of the cluster at `cluster`.
    pub fn join_bft_cluster(&mut self, replica_id: u32, cluster: Vec<PeerAddress>) {
        self.bft_replica_id = Some(replica_id);
        self.notary_cluster_addresses = cluster;
    }
}

type ConfigOverrides = Box<dyn FnOnce(&mut NodeConfig) + Send>;

/// Everything [`MockNetwork::create_node`](crate::MockNetwork::create_node)
/// needs to build one node.
pub struct NodeParams {
    pub network_map_address: Option<PeerAddress>,
    /// Use this id instead of the next one from the counter. Collisions are
    /// not checked.
    pub forced_id: Option<NodeId>,
    /// Factory for this node; the network default when `None`.
    pub factory: Option<Arc<dyn NodeFactory>>,
    pub start: bool,
    pub legal_name: Option<String>,
    pub overrides: ServiceKeyOverrides,
    /// First key entropy; drawn from the network's seeded RNG when `None`.
    pub entropy_root: Option<u64>,
    pub advertised_services: Vec<ServiceInfo>,
    pub config_overrides: Option<ConfigOverrides>,
}

impl Default for NodeParams {
    fn default() -> Self {
        Self {
            network_map_address: None,
            forced_id: None,
            factory: None,
            start: true,
            legal_name: None,
            overrides: ServiceKeyOverrides::new(),
            entropy_root: None,
            advertised_services: Vec::new(),
            config_overrides: None,
        }
    }
}

impl fmt::Debug for NodeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeParams")
            .field("network_map_address", &self.network_map_address)
            .field("forced_id", &self.forced_id)
            .field("custom_factory", &self.factory.is_some())
            .field("start", &self.start)
            .field("legal_name", &self.legal_name)
            .field("overrides", &self.overrides.len())
            .field("entropy_root", &self.entropy_root)
            .field("advertised_services", &self.advertised_services)
            .field("config_overrides", &self.config_overrides.is_some())
            .finish()
    }
}

impl NodeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network_map(mut self, address: PeerAddress) -> Self {
        self.network_map_address = Some(address);
        self
    }

    pub fn with_forced_id(mut self, id: NodeId) -> Self {
        self.forced_id = Some(id);
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn NodeFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_start(mut self, start: bool) -> Self {
        self.start = start;
        self
    }

    pub fn with_legal_name(mut self, legal_name: impl Into<String>) -> Self {
        self.legal_name = Some(legal_name.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ServiceKeyOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_entropy_root(mut self, entropy_root: u64) -> Self {
        self.entropy_root = Some(entropy_root);
        self
    }

    pub fn with_service(mut self, service: ServiceInfo) -> Self {
        self.advertised_services.push(service);
        self
    }

    pub fn with_service_kind(self, kind: ServiceKind) -> Self {
        self.with_service(ServiceInfo::new(kind))
    }

    pub fn with_config_overrides(
        mut self,
        overrides: impl FnOnce(&mut NodeConfig) + Send + 'static,
    ) -> Self {
        self.config_overrides = Some(Box::new(overrides));
        self
    }
}
