//! Node-side services: identities, keys, the network map and BFT replicas.
//!
//! These are the thinnest in-memory versions that let nodes start, register
//! and be told apart. Handles are cheap clones sharing one state.

use mocknet_core::{BusyCounter, Outbound, Readiness, ReadinessError, ReceivedMessage, TopicSession};
use mocknet_dispatch::NodeDispatch;
use mocknet_types::{KeyPair, NodeInfo, Party, PeerAddress, PublicKey, Signature};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Topic nodes send their [`NodeInfo`] to when registering with the map.
pub const NETWORK_MAP_REGISTER_TOPIC: &str = "platform.network_map.register";

/// Topic the network map acknowledges registrations on.
pub const NETWORK_MAP_ACK_TOPIC: &str = "platform.network_map.ack";

/// Known parties, keyed by legal name.
#[derive(Debug, Clone, Default)]
pub struct IdentityService {
    parties: Arc<RwLock<BTreeMap<String, Party>>>,
}

impl IdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a party. Re-registering a name replaces the previous party.
    pub fn register_identity(&self, party: Party) {
        self.parties.write().insert(party.name.clone(), party);
    }

    pub fn party_from_name(&self, name: &str) -> Option<Party> {
        self.parties.read().get(name).cloned()
    }

    pub fn party_from_key(&self, key: &PublicKey) -> Option<Party> {
        self.parties
            .read()
            .values()
            .find(|party| party.owning_key == *key)
            .cloned()
    }

    /// All parties, ordered by name.
    pub fn parties(&self) -> Vec<Party> {
        self.parties.read().values().cloned().collect()
    }
}

/// Key pairs a node can sign with.
#[derive(Debug, Clone, Default)]
pub struct KeyManagementService {
    keys: Arc<RwLock<HashMap<PublicKey, KeyPair>>>,
}

impl KeyManagementService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key_pair: KeyPair) {
        self.keys.write().insert(key_pair.public_key(), key_pair);
    }

    /// Public keys held, sorted.
    pub fn keys(&self) -> Vec<PublicKey> {
        let mut keys: Vec<_> = self.keys.read().keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.read().contains_key(key)
    }

    /// Sign with the private half of `key`, if held.
    pub fn sign(&self, key: &PublicKey, message: &[u8]) -> Option<Signature> {
        self.keys.read().get(key).map(|pair| pair.sign(message))
    }
}

/// Reply to a network-map registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub accepted: bool,
}

/// The registrations held by a network-map node.
#[derive(Debug, Clone, Default)]
pub struct NetworkMapService {
    registrations: Arc<Mutex<Vec<NodeInfo>>>,
}

impl NetworkMapService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node, replacing an earlier registration from the same address.
    pub fn record(&self, info: NodeInfo) {
        let mut registrations = self.registrations.lock();
        match registrations.iter_mut().find(|r| r.address == info.address) {
            Some(existing) => *existing = info,
            None => registrations.push(info),
        }
    }

    /// Registered nodes in first-registration order.
    pub fn registrations(&self) -> Vec<NodeInfo> {
        self.registrations.lock().clone()
    }

    /// Handler for [`NETWORK_MAP_REGISTER_TOPIC`]: records the node and
    /// acknowledges on [`NETWORK_MAP_ACK_TOPIC`].
    pub fn registration_handler(&self) -> impl FnMut(&ReceivedMessage) -> Vec<Outbound> + Send {
        let service = self.clone();
        move |message: &ReceivedMessage| {
            let accepted = match serde_json::from_slice::<NodeInfo>(&message.data) {
                Ok(info) => {
                    debug!(node = %info.address, "Network map registered node");
                    service.record(info);
                    true
                }
                Err(e) => {
                    warn!(sender = %message.sender, error = %e, "Rejected malformed registration");
                    false
                }
            };
            encode_response(&RegistrationResponse { accepted })
                .map(|data| {
                    vec![Outbound::reply(
                        message,
                        TopicSession::topic(NETWORK_MAP_ACK_TOPIC),
                        data,
                    )]
                })
                .unwrap_or_default()
        }
    }
}

fn encode_response(response: &RegistrationResponse) -> Option<Vec<u8>> {
    serde_json::to_vec(response)
        .map_err(|e| warn!(error = %e, "Failed to encode registration response"))
        .ok()
}

/// Handler for [`NETWORK_MAP_ACK_TOPIC`]: completes `registration`.
pub(crate) fn registration_ack_handler(
    registration: Readiness,
) -> impl FnMut(&ReceivedMessage) -> Vec<Outbound> + Send {
    move |message: &ReceivedMessage| {
        match serde_json::from_slice::<RegistrationResponse>(&message.data) {
            Ok(RegistrationResponse { accepted: true }) => {
                registration.set();
            }
            Ok(RegistrationResponse { accepted: false }) => {
                registration.fail(format!("network map {} rejected registration", message.sender));
            }
            Err(e) => {
                registration.fail(format!("malformed registration response: {e}"));
            }
        }
        Vec::new()
    }
}

/// One member of a replicated notary cluster.
///
/// Consensus itself is out of scope; the replica only tracks its place in
/// the cluster and whether it finished initializing.
#[derive(Debug, Clone)]
pub struct BftReplica {
    replica_id: u32,
    cluster_key: PublicKey,
    cluster: Vec<PeerAddress>,
    initialized: Readiness,
}

impl BftReplica {
    pub fn new(replica_id: u32, cluster_key: PublicKey, cluster: Vec<PeerAddress>) -> Self {
        Self {
            replica_id,
            cluster_key,
            cluster,
            initialized: Readiness::new(),
        }
    }

    pub fn replica_id(&self) -> u32 {
        self.replica_id
    }

    pub fn cluster_key(&self) -> PublicKey {
        self.cluster_key
    }

    pub fn cluster(&self) -> &[PeerAddress] {
        &self.cluster
    }

    /// Post initialization to the node's worker. Completes asynchronously.
    pub fn start(&self, dispatch: &NodeDispatch, busy: &BusyCounter) {
        let token = busy.track();
        let initialized = self.initialized.clone();
        let replica_id = self.replica_id;
        let members = self.cluster.len();
        let posted = dispatch.execute(move || {
            let _token = token;
            debug!(replica_id, members, "BFT replica initialized");
            initialized.set();
        });
        if let Err(e) = posted {
            self.initialized.fail(e.to_string());
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.outcome() == Some(Ok(()))
    }

    /// Block until initialization finished.
    pub fn wait_initialized(&self) -> Result<(), ReadinessError> {
        self.initialized.wait()
    }
}
