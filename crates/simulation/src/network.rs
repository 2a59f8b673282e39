//! The mock network orchestrator.

use crate::fs::InMemoryFs;
use crate::{
    DefaultFactory, MockNetworkConfig, MockNetworkError, MockNode, MockNodeArgs, NetworkContext,
    NodeConfig, NodeFactory, NodeParams,
};
use mocknet_core::{BusyCounter, MessageTransfer};
use mocknet_dispatch::SharedWorker;
use mocknet_network::{FabricStats, InMemoryMessagingNetwork, MessagingConfig};
use mocknet_types::{MessageRecipient, NetworkId, NodeId, NodeIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// An in-memory network of mock nodes.
///
/// Owns every node in creation order, the messaging fabric connecting them
/// and the worker they share. In the default mode nothing runs unless the
/// test drives it: [`run_network`](Self::run_network) pumps one message per
/// node per round, in registry order, on the shared worker. Given the same
/// seed and the same calls, runs are identical.
pub struct MockNetwork {
    config: MockNetworkConfig,
    /// All nodes, indexed by [`NodeIndex`].
    nodes: Vec<MockNode>,
    next_node_id: i32,
    network_id: NetworkId,
    fs: InMemoryFs,
    context: NetworkContext,
    default_factory: Arc<dyn NodeFactory>,
    /// Draws default entropy roots.
    rng: ChaCha8Rng,
}

impl std::fmt::Debug for MockNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNetwork")
            .field("network_id", &self.network_id)
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl MockNetwork {
    /// Create an empty network building nodes with [`DefaultFactory`].
    pub fn new(config: MockNetworkConfig) -> Result<Self, MockNetworkError> {
        Self::with_factory(config, Arc::new(DefaultFactory))
    }

    /// Create an empty network with a custom default node factory.
    pub fn with_factory(
        config: MockNetworkConfig,
        default_factory: Arc<dyn NodeFactory>,
    ) -> Result<Self, MockNetworkError> {
        let network_id = NetworkId::unique();
        let busy = BusyCounter::new();
        let fabric = InMemoryMessagingNetwork::new(
            MessagingConfig::default()
                .with_send_manually_pumped(config.network_send_manually_pumped)
                .with_allocation(config.allocation)
                .with_seed(config.seed),
            busy.clone(),
        );
        let shared_worker = Arc::new(SharedWorker::spawn(format!("mocknet-{network_id}"))?);

        info!(
            %network_id,
            seed = config.seed,
            thread_per_node = config.thread_per_node,
            send_manually_pumped = config.network_send_manually_pumped,
            "Created mock network"
        );

        Ok(Self {
            context: NetworkContext {
                fabric,
                shared_worker,
                busy,
                network_id,
                thread_per_node: config.thread_per_node,
                network_send_manually_pumped: config.network_send_manually_pumped,
            },
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            nodes: Vec::new(),
            next_node_id: 0,
            network_id,
            fs: InMemoryFs::new(),
            default_factory,
        })
    }

    pub fn config(&self) -> &MockNetworkConfig {
        &self.config
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn fabric(&self) -> &InMemoryMessagingNetwork {
        &self.context.fabric
    }

    pub fn shared_worker(&self) -> &Arc<SharedWorker> {
        &self.context.shared_worker
    }

    pub fn busy(&self) -> &BusyCounter {
        &self.context.busy
    }

    pub fn fs(&self) -> &InMemoryFs {
        &self.fs
    }

    pub fn stats(&self) -> FabricStats {
        self.context.fabric.stats()
    }

    // ─── Registry ───

    pub fn nodes(&self) -> &[MockNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&MockNode> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut MockNode> {
        self.nodes.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Take the next id from the counter.
    pub(crate) fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    /// Build a node, register it, and start it unless `params.start` is false.
    ///
    /// The node stays registered even if starting it fails. Under
    /// thread-per-node, a node with a network map blocks here until the map
    /// acknowledged its registration.
    pub fn create_node(&mut self, params: NodeParams) -> Result<NodeIndex, MockNetworkError> {
        let NodeParams {
            network_map_address,
            forced_id,
            factory,
            start,
            legal_name,
            overrides,
            entropy_root,
            advertised_services,
            config_overrides,
        } = params;

        let id = match forced_id {
            Some(id) => id,
            None => self.allocate_id(),
        };
        let mut config = NodeConfig::new(id, self.network_id, legal_name);
        if let Some(apply) = config_overrides {
            apply(&mut config);
        }
        self.fs.create_dir_all(&config.base_directory);

        let entropy_root = entropy_root.unwrap_or_else(|| self.rng.gen());
        let factory = factory.unwrap_or_else(|| Arc::clone(&self.default_factory));
        let node = factory.create(MockNodeArgs {
            context: self.context.clone(),
            config,
            network_map_address,
            advertised_services,
            id,
            overrides,
            entropy_root,
        })?;

        self.nodes.push(node);
        let index = self.nodes.len() - 1;
        debug!(node = %id, index, start, "Registered node");

        if start {
            let thread_per_node = self.config.thread_per_node;
            let node = &mut self.nodes[index];
            node.start()?;
            if thread_per_node && network_map_address.is_some() {
                node.ensure_registered()?;
            }
        }
        Ok(index)
    }

    /// [`create_node`](Self::create_node) without starting the node.
    pub fn create_unstarted_node(
        &mut self,
        params: NodeParams,
    ) -> Result<NodeIndex, MockNetworkError> {
        self.create_node(params.with_start(false))
    }

    /// Resolve a recipient to the node behind it.
    ///
    /// A peer address must match exactly one node; a service resolves to the
    /// first node advertising it.
    pub fn address_to_node(
        &self,
        recipient: &MessageRecipient,
    ) -> Result<&MockNode, MockNetworkError> {
        self.address_to_index(recipient).map(|index| &self.nodes[index])
    }

    /// Like [`address_to_node`](Self::address_to_node), returning the
    /// registry index.
    pub fn address_to_index(
        &self,
        recipient: &MessageRecipient,
    ) -> Result<NodeIndex, MockNetworkError> {
        let unresolved = || MockNetworkError::UnresolvedAddress(recipient.clone());
        match recipient {
            MessageRecipient::Peer(address) => {
                let mut matches = self
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, node)| node.address() == *address)
                    .map(|(index, _)| index);
                match (matches.next(), matches.next()) {
                    (Some(index), None) => Ok(index),
                    _ => Err(unresolved()),
                }
            }
            MessageRecipient::Service(service) => self
                .nodes
                .iter()
                .position(|node| node.advertises(service))
                .ok_or_else(unresolved),
        }
    }

    // ─── Pumping ───

    /// Pump until a round delivers nothing. Returns the messages delivered.
    ///
    /// Has no upper bound: handlers that keep replying forever make this
    /// loop forever.
    pub fn run_network(&mut self) -> Result<usize, MockNetworkError> {
        self.pump_rounds(None)
    }

    /// Pump exactly `rounds` rounds, even once nothing is left to deliver.
    pub fn run_network_rounds(&mut self, rounds: usize) -> Result<usize, MockNetworkError> {
        self.pump_rounds(Some(rounds))
    }

    fn pump_rounds(&mut self, limit: Option<usize>) -> Result<usize, MockNetworkError> {
        if self.config.network_send_manually_pumped {
            return Err(MockNetworkError::SendManuallyPumped);
        }
        let mut rounds = 0;
        let mut delivered = 0;
        loop {
            if limit.is_some_and(|limit| rounds >= limit) {
                break;
            }
            let in_round = self.pump_round()?;
            rounds += 1;
            delivered += in_round;
            if limit.is_none() && in_round == 0 {
                break;
            }
        }
        debug!(rounds, delivered, "Pumped network");
        Ok(delivered)
    }

    /// Let each started, manually pumped node deliver at most one message.
    fn pump_round(&self) -> Result<usize, MockNetworkError> {
        let mut delivered = 0;
        for node in self.nodes.iter().filter(|node| node.is_manually_pumped()) {
            if let Some(message) = node.pump_receive(false)? {
                trace!(node = %node.id(), message = %message.id, "Pumped message");
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Route one manually pumped send into its recipient's inbox.
    pub fn pump_send(&self) -> Result<Option<MessageTransfer>, MockNetworkError> {
        Ok(self.context.fabric.pump_send()?)
    }

    // ─── Lifecycle ───

    /// Start every node that is not started.
    pub fn start_nodes(&mut self) -> Result<(), MockNetworkError> {
        for node in self.nodes.iter_mut().filter(|node| !node.is_started()) {
            node.start()?;
        }
        Ok(())
    }

    /// Stop every started node.
    pub fn stop_nodes(&mut self) {
        for node in self.nodes.iter_mut().filter(|node| node.is_started()) {
            node.stop();
        }
    }

    /// Block until no sends, deliveries or scheduled node work are
    /// outstanding.
    pub fn wait_quiescent(&self) {
        self.context.busy.wait_idle();
    }

    /// [`wait_quiescent`](Self::wait_quiescent) with a bound. Returns true if
    /// the network went quiet.
    pub fn wait_quiescent_timeout(&self, timeout: Duration) -> bool {
        self.context.busy.wait_idle_timeout(timeout)
    }
}

impl Drop for MockNetwork {
    fn drop(&mut self) {
        self.stop_nodes();
    }
}
