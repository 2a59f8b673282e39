//! BFT notary clusters and their readiness barrier.

use crate::{MockNetwork, MockNetworkError, NodeError, NodeParams};
use mocknet_types::{
    KeyPair, NodeIndex, PeerAddress, PublicKey, ServiceInfo, ServiceKeyOverrides, ServiceKind,
};
use tracing::{debug, info};

/// Service name shared by every replica built by
/// [`MockNetwork::create_bft_notary_cluster`].
pub const BFT_CLUSTER_SERVICE_NAME: &str = "BFT Notary Cluster";

impl MockNetwork {
    /// Block until every replica of the cluster identified by `notary_key`
    /// has initialized.
    ///
    /// Cluster members are the nodes whose advertised service identity is
    /// `notary_key`; for a node that never started, its service key
    /// overrides decide. If their number differs from
    /// `cluster_addresses.len()` this fails at once, without waiting on
    /// anything. A member that never started fails with
    /// [`MockNetworkError::ReplicaNotStarted`].
    pub fn wait_until_all_replicas_have_initialized(
        &self,
        notary_key: &PublicKey,
        cluster_addresses: &[PeerAddress],
    ) -> Result<(), MockNetworkError> {
        let members: Vec<_> = self
            .nodes()
            .iter()
            .filter(|node| node.has_service_key(notary_key))
            .collect();

        if members.len() != cluster_addresses.len() {
            return Err(MockNetworkError::ClusterMismatch {
                expected: cluster_addresses.len(),
                found: members.len(),
            });
        }

        if let Some(node) = members.iter().find(|node| node.info().is_none()) {
            return Err(MockNetworkError::ReplicaNotStarted(node.id()));
        }

        for node in members {
            let replica = node
                .bft_replica()
                .ok_or(MockNetworkError::MissingReplica(node.id()))?;
            replica
                .wait_initialized()
                .map_err(|source| NodeError::ReplicaInit {
                    node: node.id(),
                    source,
                })?;
            debug!(node = %node.id(), replica_id = replica.replica_id(), "Replica ready");
        }
        Ok(())
    }

    /// Build `size` BFT notary replicas sharing `cluster_key`, then wait for
    /// all of them to initialize.
    ///
    /// Replica `i` gets replica id `i`; every replica knows the full list of
    /// cluster addresses.
    pub fn create_bft_notary_cluster(
        &mut self,
        size: usize,
        cluster_key: KeyPair,
        network_map_address: Option<PeerAddress>,
    ) -> Result<Vec<NodeIndex>, MockNetworkError> {
        let ids: Vec<_> = (0..size).map(|_| self.allocate_id()).collect();
        let cluster: Vec<_> = ids.iter().copied().map(PeerAddress::new).collect();
        let service = ServiceInfo::named(ServiceKind::BftNotary, BFT_CLUSTER_SERVICE_NAME);

        let mut replicas = Vec::with_capacity(size);
        for (replica_id, id) in (0u32..).zip(ids) {
            let members = cluster.clone();
            let mut params = NodeParams::new()
                .with_forced_id(id)
                .with_service(service.clone())
                .with_overrides(
                    ServiceKeyOverrides::new().with(ServiceKind::BftNotary, cluster_key.clone()),
                )
                .with_config_overrides(move |config| config.join_bft_cluster(replica_id, members));
            params.network_map_address = network_map_address;
            replicas.push(self.create_node(params)?);
        }

        self.wait_until_all_replicas_have_initialized(&cluster_key.public_key(), &cluster)?;
        info!(size, key = %cluster_key.public_key().short_hex(), "BFT notary cluster ready");
        Ok(replicas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockNetworkConfig;
    use mocknet_types::NodeId;

    #[test]
    fn test_cluster_builds_and_initializes() {
        let mut net = MockNetwork::new(MockNetworkConfig::default()).unwrap();
        let key = KeyPair::from_entropy(500);
        let replicas = net.create_bft_notary_cluster(3, key.clone(), None).unwrap();

        assert_eq!(replicas.len(), 3);
        for (expected_id, &index) in replicas.iter().enumerate() {
            let node = net.node(index).unwrap();
            let replica = node.bft_replica().unwrap();
            assert_eq!(replica.replica_id(), expected_id as u32);
            assert_eq!(replica.cluster_key(), key.public_key());
            assert_eq!(replica.cluster().len(), 3);
            assert!(replica.is_initialized());
        }
    }

    #[test]
    fn test_barrier_fails_fast_on_count_mismatch() {
        let mut net = MockNetwork::new(MockNetworkConfig::default()).unwrap();
        let key = KeyPair::from_entropy(7);
        net.create_bft_notary_cluster(3, key.clone(), None).unwrap();

        let expected: Vec<_> = (0..4).map(|i| PeerAddress::new(NodeId(i))).collect();
        assert_eq!(
            net.wait_until_all_replicas_have_initialized(&key.public_key(), &expected),
            Err(MockNetworkError::ClusterMismatch {
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn test_non_bft_member_has_no_replica() {
        let mut net = MockNetwork::new(MockNetworkConfig::default()).unwrap();
        let key = KeyPair::from_entropy(9);
        let overrides = ServiceKeyOverrides::new().with(ServiceKind::SimpleNotary, key.clone());
        let index = net
            .create_node(
                NodeParams::new()
                    .with_service_kind(ServiceKind::SimpleNotary)
                    .with_overrides(overrides),
            )
            .unwrap();
        let address = net.node(index).unwrap().address();
        assert_eq!(
            net.wait_until_all_replicas_have_initialized(&key.public_key(), &[address]),
            Err(MockNetworkError::MissingReplica(NodeId(0)))
        );
    }

    #[test]
    fn test_barrier_reports_unstarted_replica() {
        let mut net = MockNetwork::new(MockNetworkConfig::default()).unwrap();
        let key = KeyPair::from_entropy(11);
        let overrides = ServiceKeyOverrides::new().with(ServiceKind::BftNotary, key.clone());
        let index = net
            .create_unstarted_node(
                NodeParams::new()
                    .with_service(ServiceInfo::named(
                        ServiceKind::BftNotary,
                        BFT_CLUSTER_SERVICE_NAME,
                    ))
                    .with_overrides(overrides),
            )
            .unwrap();
        let address = net.node(index).unwrap().address();
        assert_eq!(
            net.wait_until_all_replicas_have_initialized(&key.public_key(), &[address]),
            Err(MockNetworkError::ReplicaNotStarted(NodeId(0)))
        );

        net.start_nodes().unwrap();
        assert_eq!(
            net.wait_until_all_replicas_have_initialized(&key.public_key(), &[address]),
            Ok(())
        );
    }
}
