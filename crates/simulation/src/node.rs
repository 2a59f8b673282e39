//! A simulated ledger node.

use crate::services::{
    registration_ack_handler, BftReplica, IdentityService, KeyManagementService,
    NetworkMapService, NETWORK_MAP_ACK_TOPIC, NETWORK_MAP_REGISTER_TOPIC,
};
use crate::{MockNodeArgs, NodeConfig, NodeError};
use indexmap::IndexMap;
use mocknet_core::{
    BusyCounter, Message, MessageHandler, MessageId, Outbound, Readiness, ReceivedMessage,
    TopicSession,
};
use mocknet_dispatch::{NodeDispatch, SharedWorker};
use mocknet_network::{InMemoryEndpoint, InMemoryMessagingNetwork};
use mocknet_types::{
    KeyPair, MessageRecipient, NetworkId, NodeId, NodeInfo, Party, PeerAddress, PublicKey,
    ServiceEntry, ServiceInfo, ServiceKeyOverrides, ServiceKind,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles a node shares with the network it belongs to.
///
/// Deliberately excludes the node registry: nodes reach each other only
/// through the fabric.
#[derive(Debug, Clone)]
pub struct NetworkContext {
    pub fabric: InMemoryMessagingNetwork,
    pub shared_worker: Arc<SharedWorker>,
    pub busy: BusyCounter,
    pub network_id: NetworkId,
    pub thread_per_node: bool,
    pub network_send_manually_pumped: bool,
}

type SharedHandler = Arc<Mutex<Box<dyn MessageHandler>>>;

/// One simulated node.
///
/// Created stopped; [`start`](Self::start) connects it to the fabric, and
/// [`stop`](Self::stop) disconnects it again. On the shared worker a node
/// counts as a holder from construction until it stops or is dropped.
/// Identity keys are generated on the first start and kept across restarts,
/// as are user message handlers.
pub struct MockNode {
    id: NodeId,
    context: NetworkContext,
    config: NodeConfig,
    network_map_address: Option<PeerAddress>,
    advertised_services: Vec<ServiceInfo>,
    overrides: ServiceKeyOverrides,
    entropy_root: u64,
    entropy_counter: u64,
    started: bool,
    /// Executor held by this node. On the shared worker it is taken at
    /// construction, so registered but unstarted nodes keep the worker alive.
    executor: Option<NodeDispatch>,
    handlers: IndexMap<TopicSession, SharedHandler>,
    endpoint: Option<InMemoryEndpoint>,
    info: Option<NodeInfo>,
    identity: IdentityService,
    keys: KeyManagementService,
    network_map: Option<NetworkMapService>,
    registration: Readiness,
    bft_replica: Option<BftReplica>,
}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNode")
            .field("id", &self.id)
            .field("legal_name", &self.config.legal_name)
            .field("started", &self.started)
            .field("advertised_services", &self.advertised_services)
            .field("network_map_address", &self.network_map_address)
            .finish_non_exhaustive()
    }
}

impl MockNode {
    /// Build a stopped node. Fails if an override targets a service the node
    /// does not advertise, or if the shared worker is already torn down.
    pub fn new(args: MockNodeArgs) -> Result<Self, NodeError> {
        let MockNodeArgs {
            context,
            config,
            network_map_address,
            advertised_services,
            id,
            overrides,
            entropy_root,
        } = args;
        overrides.validate(&advertised_services)?;

        let network_map = advertised_services
            .iter()
            .any(|service| service.kind == ServiceKind::NetworkMap)
            .then(NetworkMapService::new);
        let executor = if context.thread_per_node {
            None
        } else {
            Some(NodeDispatch::shared(&context.shared_worker)?)
        };

        Ok(Self {
            id,
            context,
            config,
            network_map_address,
            advertised_services,
            overrides,
            entropy_root,
            entropy_counter: 0,
            started: false,
            executor,
            handlers: IndexMap::new(),
            endpoint: None,
            info: None,
            identity: IdentityService::new(),
            keys: KeyManagementService::new(),
            network_map,
            registration: Readiness::new(),
            bft_replica: None,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn address(&self) -> PeerAddress {
        PeerAddress::new(self.id)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn network_map_address(&self) -> Option<PeerAddress> {
        self.network_map_address
    }

    pub fn advertised_services(&self) -> &[ServiceInfo] {
        &self.advertised_services
    }

    pub fn advertises(&self, service: &ServiceInfo) -> bool {
        self.advertised_services.contains(service)
    }

    pub fn entropy_root(&self) -> u64 {
        self.entropy_root
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether deliveries to this node only happen when it is pumped.
    pub fn is_manually_pumped(&self) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|endpoint| !endpoint.has_receive_thread())
    }

    /// Published information; available once the node has started.
    pub fn info(&self) -> Option<&NodeInfo> {
        self.info.as_ref()
    }

    pub fn legal_identity(&self) -> Option<&Party> {
        self.info.as_ref().map(|info| &info.legal_identity)
    }

    pub fn identity_service(&self) -> &IdentityService {
        &self.identity
    }

    pub fn key_management(&self) -> &KeyManagementService {
        &self.keys
    }

    /// Registrations received, if this node runs the network map.
    pub fn network_map_registrations(&self) -> Vec<NodeInfo> {
        self.network_map
            .as_ref()
            .map(NetworkMapService::registrations)
            .unwrap_or_default()
    }

    /// Whether `key` backs one of the node's advertised services.
    ///
    /// Before the first start only override keys are known.
    pub fn has_service_key(&self, key: &PublicKey) -> bool {
        match &self.info {
            Some(info) => info
                .advertised_services
                .iter()
                .any(|entry| entry.identity.owning_key == *key),
            None => self.advertised_services.iter().any(|service| {
                self.overrides
                    .get(service.kind)
                    .is_some_and(|pair| pair.public_key() == *key)
            }),
        }
    }

    pub fn bft_replica(&self) -> Option<&BftReplica> {
        self.bft_replica.as_ref()
    }

    /// Signal completed once the network map acknowledged this node.
    pub fn registration(&self) -> &Readiness {
        &self.registration
    }

    /// Block until the node is registered with its network map.
    pub fn ensure_registered(&self) -> Result<(), NodeError> {
        self.registration
            .wait()
            .map_err(|source| NodeError::Registration {
                node: self.id,
                source,
            })
    }

    /// Derive the next key pair from the entropy counter.
    fn generate_key_pair(&mut self) -> KeyPair {
        self.entropy_counter = self.entropy_counter.wrapping_add(1);
        let key = KeyPair::from_entropy(self.entropy_root.wrapping_add(self.entropy_counter));
        self.keys.add(key.clone());
        key
    }

    fn generate_identity(&mut self) -> NodeInfo {
        let legal_key = self.generate_key_pair();
        let legal_identity = Party::new(self.config.legal_name.clone(), legal_key.public_key());

        let services = self.advertised_services.clone();
        let advertised_services = services
            .into_iter()
            .map(|service| {
                let key = match self.overrides.get(service.kind) {
                    Some(key) => {
                        self.keys.add(key.clone());
                        key.clone()
                    }
                    None => self.generate_key_pair(),
                };
                let name = service
                    .name
                    .clone()
                    .unwrap_or_else(|| self.config.legal_name.clone());
                ServiceEntry {
                    info: service,
                    identity: Party::new(name, key.public_key()),
                }
            })
            .collect();

        NodeInfo {
            address: self.address(),
            legal_identity,
            advertised_services,
        }
    }

    /// Connect the node to the fabric and register it with its network map.
    ///
    /// A no-op for a started node. Registration completes asynchronously;
    /// see [`ensure_registered`](Self::ensure_registered).
    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Ok(());
        }

        let dispatch = self.acquire_executor()?;

        let info = match &self.info {
            Some(info) => info.clone(),
            None => {
                let info = self.generate_identity();
                self.info = Some(info.clone());
                info
            }
        };

        let endpoint = match self.context.fabric.create_node_with_id(
            self.id,
            !self.context.thread_per_node,
            dispatch.clone(),
            self.advertised_services.clone(),
            self.config.legal_name.clone(),
        ) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                // A private worker is only spun up for a running node.
                if !dispatch.is_shared() {
                    self.release_executor();
                }
                return Err(e.into());
            }
        };

        for (topic_session, handler) in &self.handlers {
            install(&endpoint, topic_session.clone(), Arc::clone(handler));
        }

        self.registration = Readiness::new();
        if let Some(network_map) = &self.network_map {
            network_map.record(info.clone());
            endpoint.add_message_handler(
                TopicSession::topic(NETWORK_MAP_REGISTER_TOPIC),
                network_map.registration_handler(),
            );
        }
        endpoint.add_message_handler(
            TopicSession::topic(NETWORK_MAP_ACK_TOPIC),
            registration_ack_handler(self.registration.clone()),
        );

        self.identity.register_identity(info.legal_identity.clone());
        for entry in &info.advertised_services {
            self.identity.register_identity(entry.identity.clone());
        }

        if let Some(entry) = info
            .advertised_services
            .iter()
            .find(|entry| entry.info.kind == ServiceKind::BftNotary)
        {
            let replica = self.bft_replica.get_or_insert_with(|| {
                BftReplica::new(
                    self.config.bft_replica_id.unwrap_or(0),
                    entry.identity.owning_key,
                    self.config.notary_cluster_addresses.clone(),
                )
            });
            replica.start(&dispatch, &self.context.busy);
        }

        self.endpoint = Some(endpoint);
        self.started = true;
        self.register_with_network_map(&info);

        info!(
            node = %self.id,
            legal_name = %self.config.legal_name,
            services = self.advertised_services.len(),
            "Started node"
        );
        Ok(())
    }

    fn acquire_executor(&mut self) -> Result<NodeDispatch, NodeError> {
        if let Some(dispatch) = &self.executor {
            return Ok(dispatch.clone());
        }
        let dispatch = if self.context.thread_per_node {
            NodeDispatch::dedicated(format!("node-{}", self.id.get()))?
        } else {
            NodeDispatch::shared(&self.context.shared_worker)?
        };
        self.executor = Some(dispatch.clone());
        Ok(dispatch)
    }

    fn release_executor(&mut self) {
        if let Some(dispatch) = self.executor.take() {
            dispatch.shutdown();
        }
    }

    fn register_with_network_map(&self, info: &NodeInfo) {
        let map_address = match self.network_map_address {
            Some(address) if address != self.address() => address,
            _ => {
                self.registration.set();
                return;
            }
        };
        let payload = match serde_json::to_vec(info) {
            Ok(payload) => payload,
            Err(e) => {
                self.registration.fail(format!("failed to encode node info: {e}"));
                return;
            }
        };
        let message = Message::new(TopicSession::topic(NETWORK_MAP_REGISTER_TOPIC), payload);
        match self.send(map_address, message) {
            Ok(id) => debug!(
                node = %self.id,
                map = %map_address,
                message = %id,
                "Sent network map registration"
            ),
            Err(e) => {
                warn!(
                    node = %self.id,
                    map = %map_address,
                    error = %e,
                    "Network map registration failed"
                );
                self.registration.fail(e.to_string());
            }
        }
    }

    /// Disconnect from the fabric and give back the executor.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.stop();
        }
        self.release_executor();
        self.registration
            .fail(format!("{} stopped before registering", self.id));
        self.started = false;
        info!(node = %self.id, "Stopped node");
    }

    fn endpoint(&self) -> Result<&InMemoryEndpoint, NodeError> {
        self.endpoint.as_ref().ok_or(NodeError::NotStarted(self.id))
    }

    pub fn send(
        &self,
        recipient: impl Into<MessageRecipient>,
        message: Message,
    ) -> Result<MessageId, NodeError> {
        Ok(self.endpoint()?.send(recipient, message)?)
    }

    /// Install a handler for a topic session.
    ///
    /// Handlers outlive restarts; on a started node the handler is live
    /// immediately.
    pub fn add_message_handler(
        &mut self,
        topic_session: TopicSession,
        handler: impl MessageHandler + 'static,
    ) {
        let handler: SharedHandler = Arc::new(Mutex::new(Box::new(handler)));
        if let Some(endpoint) = &self.endpoint {
            install(endpoint, topic_session.clone(), Arc::clone(&handler));
        }
        self.handlers.insert(topic_session, handler);
    }

    /// Deliver at most one pending message. Stopped nodes deliver nothing.
    pub fn pump_receive(&self, block: bool) -> Result<Option<ReceivedMessage>, NodeError> {
        match &self.endpoint {
            Some(endpoint) => Ok(endpoint.pump_receive(block)?),
            None => Ok(None),
        }
    }

    /// Run `job` on the node's executor, counted as outstanding work until
    /// it finishes.
    pub fn execute_async(&self, job: impl FnOnce() + Send + 'static) -> Result<(), NodeError> {
        let endpoint = self.endpoint()?;
        let token = self.context.busy.track();
        endpoint.dispatch().execute(move || {
            let _token = token;
            job();
        })?;
        Ok(())
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.stop();
        self.release_executor();
    }
}

fn install(endpoint: &InMemoryEndpoint, topic_session: TopicSession, handler: SharedHandler) {
    endpoint.add_message_handler(
        topic_session,
        move |message: &ReceivedMessage| -> Vec<Outbound> { handler.lock().handle(message) },
    );
}
