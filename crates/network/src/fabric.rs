//! The in-memory messaging fabric.

use crate::allocation::{Allocator, ServicePeerAllocationStrategy};
use crate::endpoint::InMemoryEndpoint;
use crate::NetworkError;
use indexmap::IndexMap;
use mocknet_core::{BusyCounter, Message, MessageId, MessageTransfer};
use mocknet_dispatch::NodeDispatch;
use mocknet_types::{MessageRecipient, NodeId, PeerAddress, ServiceInfo};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Configuration for the messaging fabric.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// When true, sends are queued and only routed by
    /// [`InMemoryMessagingNetwork::pump_send`].
    pub send_manually_pumped: bool,
    /// How service-addressed messages pick a provider.
    pub allocation: ServicePeerAllocationStrategy,
    /// Seed for the random allocation strategy.
    pub seed: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            send_manually_pumped: false,
            allocation: ServicePeerAllocationStrategy::Random,
            seed: 0,
        }
    }
}

impl MessagingConfig {
    pub fn with_send_manually_pumped(mut self, manual: bool) -> Self {
        self.send_manually_pumped = manual;
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

/// Delivery counters for the whole fabric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FabricStats {
    /// Messages accepted by `send`.
    pub messages_sent: u64,
    /// Messages handed to a registered handler.
    pub messages_delivered: u64,
    /// Messages whose recipient could not be resolved.
    pub dropped_unroutable: u64,
    /// Messages that reached an endpoint with no handler for their topic.
    pub dropped_unhandled: u64,
}

#[derive(Debug)]
struct FabricState {
    /// Inbox per registered address, in registration order.
    inboxes: IndexMap<PeerAddress, VecDeque<MessageTransfer>>,
    /// Running providers per service, in registration order.
    services: IndexMap<ServiceInfo, Vec<PeerAddress>>,
    /// Sends awaiting `pump_send` in manual mode.
    send_queue: VecDeque<MessageTransfer>,
    stopped: HashSet<PeerAddress>,
    allocator: Allocator,
    next_message_id: u64,
    stats: FabricStats,
}

impl FabricState {
    fn resolve(&mut self, recipient: &MessageRecipient) -> Result<PeerAddress, NetworkError> {
        match recipient {
            MessageRecipient::Peer(address) => {
                if self.inboxes.contains_key(address) {
                    Ok(*address)
                } else {
                    Err(NetworkError::UnknownPeer(*address))
                }
            }
            MessageRecipient::Service(service) => {
                let providers = self.services.get(service).map(Vec::as_slice).unwrap_or(&[]);
                self.allocator
                    .pick(service, providers)
                    .ok_or_else(|| NetworkError::NoServiceProvider(service.clone()))
            }
        }
    }

    /// Queue `transfer` in its recipient's inbox.
    ///
    /// Returns true when the recipient is stopped and the message is parked
    /// until it restarts.
    fn route(&mut self, transfer: MessageTransfer) -> Result<bool, NetworkError> {
        let target = match self.resolve(&transfer.recipient) {
            Ok(target) => target,
            Err(e) => {
                self.stats.dropped_unroutable += 1;
                return Err(e);
            }
        };
        trace!(message = %transfer, to = %target, "Routed message");
        self.inboxes
            .get_mut(&target)
            .ok_or(NetworkError::UnknownPeer(target))?
            .push_back(transfer);
        Ok(self.stopped.contains(&target))
    }
}

struct Shared {
    state: Mutex<FabricState>,
    /// Signalled whenever an inbox receives a message or an endpoint stops.
    arrived: Condvar,
    busy: BusyCounter,
    send_manually_pumped: bool,
}

/// Routes messages between the endpoints of a mock network.
///
/// Each registered address owns a FIFO inbox. A send is counted as busy work
/// until its delivery finishes (or it turns out to be unroutable), which is
/// what lets an orchestrator wait for quiescence. Clones share the same
/// fabric.
#[derive(Clone)]
pub struct InMemoryMessagingNetwork {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for InMemoryMessagingNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("InMemoryMessagingNetwork")
            .field("endpoints", &state.inboxes.len())
            .field("queued_sends", &state.send_queue.len())
            .field("stats", &state.stats)
            .finish()
    }
}

impl InMemoryMessagingNetwork {
    /// Create a fabric reporting outstanding work to `busy`.
    pub fn new(config: MessagingConfig, busy: BusyCounter) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(FabricState {
                    inboxes: IndexMap::new(),
                    services: IndexMap::new(),
                    send_queue: VecDeque::new(),
                    stopped: HashSet::new(),
                    allocator: Allocator::new(config.allocation, config.seed),
                    next_message_id: 0,
                    stats: FabricStats::default(),
                }),
                arrived: Condvar::new(),
                busy,
                send_manually_pumped: config.send_manually_pumped,
            }),
        }
    }

    /// Whether sends wait for [`pump_send`](Self::pump_send).
    pub fn send_manually_pumped(&self) -> bool {
        self.shared.send_manually_pumped
    }

    /// Register an endpoint for `id`.
    ///
    /// A manually pumped endpoint only receives when
    /// [`InMemoryEndpoint::pump_receive`] is called; otherwise a receive
    /// thread delivers messages as they arrive. Re-registering a stopped
    /// address restarts it with its pending inbox intact.
    pub fn create_node_with_id(
        &self,
        id: NodeId,
        manually_pumped: bool,
        dispatch: NodeDispatch,
        services: Vec<ServiceInfo>,
        description: impl Into<String>,
    ) -> Result<InMemoryEndpoint, NetworkError> {
        if !id.is_valid() {
            return Err(NetworkError::InvalidNodeId(id));
        }
        let address = PeerAddress::new(id);
        let description = description.into();
        {
            let mut state = self.shared.state.lock();
            if state.inboxes.contains_key(&address) && !state.stopped.remove(&address) {
                return Err(NetworkError::AddressInUse(address));
            }
            let parked = state.inboxes.entry(address).or_default().len();
            if parked > 0 {
                self.shared.busy.increment_by(parked);
                debug!(%address, parked, "Restarted endpoint with parked messages");
            }
            for service in &services {
                let providers = state.services.entry(service.clone()).or_default();
                if !providers.contains(&address) {
                    providers.push(address);
                }
            }
        }
        debug!(
            %address,
            %description,
            manually_pumped,
            services = services.len(),
            "Registered endpoint"
        );
        InMemoryEndpoint::start(self.clone(), address, description, dispatch, manually_pumped)
    }

    /// Send a message from `sender`.
    ///
    /// Routes immediately unless sends are manually pumped, in which case the
    /// transfer waits in the send queue.
    pub fn send(
        &self,
        sender: PeerAddress,
        recipient: MessageRecipient,
        message: Message,
    ) -> Result<MessageId, NetworkError> {
        let mut state = self.shared.state.lock();
        let id = MessageId::new(state.next_message_id);
        state.next_message_id += 1;
        state.stats.messages_sent += 1;
        self.shared.busy.increment();

        let transfer = MessageTransfer {
            id,
            sender,
            recipient,
            message,
        };
        if self.shared.send_manually_pumped {
            trace!(message = %transfer, "Queued send");
            state.send_queue.push_back(transfer);
            return Ok(id);
        }
        match state.route(transfer) {
            Ok(false) => {
                self.shared.arrived.notify_all();
                Ok(id)
            }
            Ok(true) => {
                drop(state);
                self.shared.busy.decrement();
                Ok(id)
            }
            Err(e) => {
                drop(state);
                self.shared.busy.decrement();
                Err(e)
            }
        }
    }

    /// Route the oldest queued send into its recipient's inbox.
    ///
    /// Returns `Ok(None)` when nothing is queued.
    pub fn pump_send(&self) -> Result<Option<MessageTransfer>, NetworkError> {
        let mut state = self.shared.state.lock();
        let Some(transfer) = state.send_queue.pop_front() else {
            return Ok(None);
        };
        match state.route(transfer.clone()) {
            Ok(false) => {
                self.shared.arrived.notify_all();
                Ok(Some(transfer))
            }
            Ok(true) => {
                drop(state);
                self.shared.busy.decrement();
                Ok(Some(transfer))
            }
            Err(e) => {
                drop(state);
                self.shared.busy.decrement();
                warn!(message = %transfer, error = %e, "Dropped unroutable send");
                Err(e)
            }
        }
    }

    /// Number of sends waiting for [`pump_send`](Self::pump_send).
    pub fn queued_sends(&self) -> usize {
        self.shared.state.lock().send_queue.len()
    }

    /// Messages waiting in one endpoint's inbox.
    pub fn pending_messages(&self, address: PeerAddress) -> usize {
        self.shared
            .state
            .lock()
            .inboxes
            .get(&address)
            .map_or(0, VecDeque::len)
    }

    /// Messages waiting across all inboxes.
    pub fn total_pending_messages(&self) -> usize {
        self.shared.state.lock().inboxes.values().map(VecDeque::len).sum()
    }

    /// Every address ever registered, in registration order.
    pub fn endpoints(&self) -> Vec<PeerAddress> {
        self.shared.state.lock().inboxes.keys().copied().collect()
    }

    pub fn stats(&self) -> FabricStats {
        self.shared.state.lock().stats
    }

    pub(crate) fn busy(&self) -> &BusyCounter {
        &self.shared.busy
    }

    /// Pop the next message for `address`.
    ///
    /// With `block`, waits until a message arrives; returns `None` once the
    /// endpoint is stopped.
    pub(crate) fn take_next(&self, address: PeerAddress, block: bool) -> Option<MessageTransfer> {
        let mut state = self.shared.state.lock();
        loop {
            if state.stopped.contains(&address) {
                return None;
            }
            if let Some(transfer) = state.inboxes.get_mut(&address).and_then(VecDeque::pop_front) {
                return Some(transfer);
            }
            if !block {
                return None;
            }
            self.shared.arrived.wait(&mut state);
        }
    }

    /// Mark an endpoint stopped and wake its receiver.
    ///
    /// Its inbox is kept for a later restart but no longer counts as busy
    /// work; it stops providing services.
    pub(crate) fn stop_endpoint(&self, address: PeerAddress) {
        let mut state = self.shared.state.lock();
        if !state.stopped.insert(address) {
            return;
        }
        for providers in state.services.values_mut() {
            providers.retain(|provider| *provider != address);
        }
        let parked = state.inboxes.get(&address).map_or(0, VecDeque::len);
        self.shared.arrived.notify_all();
        drop(state);
        self.shared.busy.decrement_by(parked);
    }

    pub(crate) fn record_delivered(&self) {
        self.shared.state.lock().stats.messages_delivered += 1;
    }

    pub(crate) fn record_unhandled(&self) {
        self.shared.state.lock().stats.dropped_unhandled += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocknet_core::TopicSession;
    use mocknet_dispatch::SharedWorker;
    use mocknet_types::ServiceKind;

    fn fabric(config: MessagingConfig) -> (InMemoryMessagingNetwork, Arc<SharedWorker>) {
        let worker = Arc::new(SharedWorker::spawn("fabric-test").unwrap());
        (InMemoryMessagingNetwork::new(config, BusyCounter::new()), worker)
    }

    fn endpoint(
        fabric: &InMemoryMessagingNetwork,
        worker: &Arc<SharedWorker>,
        id: i32,
        services: Vec<ServiceInfo>,
    ) -> InMemoryEndpoint {
        fabric
            .create_node_with_id(
                NodeId(id),
                true,
                NodeDispatch::shared(worker).unwrap(),
                services,
                format!("node {id}"),
            )
            .unwrap()
    }

    fn ping() -> Message {
        Message::new(TopicSession::topic("ping"), b"ping".to_vec())
    }

    #[test]
    fn test_negative_id_rejected() {
        let (fabric, worker) = fabric(MessagingConfig::default());
        let result = fabric.create_node_with_id(
            NodeId(-1),
            true,
            NodeDispatch::shared(&worker).unwrap(),
            vec![],
            "bad",
        );
        assert_eq!(result.err(), Some(NetworkError::InvalidNodeId(NodeId(-1))));
    }

    #[test]
    fn test_duplicate_running_address_rejected() {
        let (fabric, worker) = fabric(MessagingConfig::default());
        let _first = endpoint(&fabric, &worker, 0, vec![]);
        let second = fabric.create_node_with_id(
            NodeId(0),
            true,
            NodeDispatch::shared(&worker).unwrap(),
            vec![],
            "dup",
        );
        assert_eq!(
            second.err(),
            Some(NetworkError::AddressInUse(PeerAddress::new(NodeId(0))))
        );
    }

    #[test]
    fn test_inbox_is_fifo() {
        let (fabric, worker) = fabric(MessagingConfig::default());
        let a = endpoint(&fabric, &worker, 0, vec![]);
        let b = endpoint(&fabric, &worker, 1, vec![]);

        let first = a.send(b.address(), ping()).unwrap();
        let second = a.send(b.address(), ping()).unwrap();
        assert_eq!(fabric.pending_messages(b.address()), 2);
        assert_eq!(fabric.take_next(b.address(), false).unwrap().id, first);
        assert_eq!(fabric.take_next(b.address(), false).unwrap().id, second);
        assert!(fabric.take_next(b.address(), false).is_none());
    }

    #[test]
    fn test_unknown_peer_is_unroutable() {
        let (fabric, worker) = fabric(MessagingConfig::default());
        let a = endpoint(&fabric, &worker, 0, vec![]);
        let nowhere = PeerAddress::new(NodeId(9));

        assert_eq!(a.send(nowhere, ping()), Err(NetworkError::UnknownPeer(nowhere)));
        assert_eq!(fabric.stats().dropped_unroutable, 1);
        assert!(fabric.busy().is_idle());
    }

    #[test]
    fn test_service_routing_round_robin() {
        let config =
            MessagingConfig::default().with_allocation(ServicePeerAllocationStrategy::RoundRobin);
        let (fabric, worker) = fabric(config);
        let notary = ServiceInfo::new(ServiceKind::SimpleNotary);
        let client = endpoint(&fabric, &worker, 0, vec![]);
        let n1 = endpoint(&fabric, &worker, 1, vec![notary.clone()]);
        let n2 = endpoint(&fabric, &worker, 2, vec![notary.clone()]);

        for _ in 0..4 {
            client.send(notary.clone(), ping()).unwrap();
        }
        assert_eq!(fabric.pending_messages(n1.address()), 2);
        assert_eq!(fabric.pending_messages(n2.address()), 2);

        n1.stop();
        n2.stop();
        assert_eq!(
            client.send(notary.clone(), ping()),
            Err(NetworkError::NoServiceProvider(notary))
        );
    }

    #[test]
    fn test_manual_send_pumping() {
        let (fabric, worker) = fabric(MessagingConfig::default().with_send_manually_pumped(true));
        let a = endpoint(&fabric, &worker, 0, vec![]);
        let b = endpoint(&fabric, &worker, 1, vec![]);

        let id = a.send(b.address(), ping()).unwrap();
        assert_eq!(fabric.queued_sends(), 1);
        assert_eq!(fabric.pending_messages(b.address()), 0);

        let routed = fabric.pump_send().unwrap().unwrap();
        assert_eq!(routed.id, id);
        assert_eq!(fabric.pending_messages(b.address()), 1);
        assert!(fabric.pump_send().unwrap().is_none());
        assert_eq!(fabric.busy().count(), 1);
    }

    #[test]
    fn test_restart_keeps_inbox() {
        let (fabric, worker) = fabric(MessagingConfig::default());
        let a = endpoint(&fabric, &worker, 0, vec![]);
        let b = endpoint(&fabric, &worker, 1, vec![]);
        a.send(b.address(), ping()).unwrap();

        b.stop();
        assert!(fabric.take_next(b.address(), true).is_none());

        let b = endpoint(&fabric, &worker, 1, vec![]);
        assert_eq!(fabric.pending_messages(b.address()), 1);
        assert_eq!(fabric.endpoints().len(), 2);
    }

    #[test]
    fn test_parked_messages_are_not_busy() {
        let (fabric, worker) = fabric(MessagingConfig::default());
        let a = endpoint(&fabric, &worker, 0, vec![]);
        let b = endpoint(&fabric, &worker, 1, vec![]);
        a.send(b.address(), ping()).unwrap();
        assert_eq!(fabric.busy().count(), 1);

        b.stop();
        assert!(fabric.busy().is_idle());
        a.send(b.address(), ping()).unwrap();
        assert!(fabric.busy().is_idle());
        assert_eq!(fabric.pending_messages(b.address()), 2);

        let b = endpoint(&fabric, &worker, 1, vec![]);
        assert_eq!(fabric.busy().count(), 2);
        assert!(fabric.take_next(b.address(), false).is_some());
    }

    #[test]
    fn test_manual_send_to_stopped_endpoint_is_parked() {
        let (fabric, worker) = fabric(MessagingConfig::default().with_send_manually_pumped(true));
        let a = endpoint(&fabric, &worker, 0, vec![]);
        let b = endpoint(&fabric, &worker, 1, vec![]);
        a.send(b.address(), ping()).unwrap();
        b.stop();
        assert_eq!(fabric.busy().count(), 1);

        assert!(fabric.pump_send().unwrap().is_some());
        assert!(fabric.busy().is_idle());
    }
}
