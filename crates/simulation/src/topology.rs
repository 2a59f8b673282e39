//! Canned network topologies.

use crate::{MockNetwork, MockNetworkError, NodeFactory, NodeParams};
use mocknet_types::{
    dummy_notary_key, KeyPair, NodeIndex, PeerAddress, ServiceInfo, ServiceKeyOverrides,
    ServiceKind,
};
use std::sync::Arc;
use tracing::info;

/// The nodes built by [`MockNetwork::create_some_nodes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketOfNodes {
    pub party_nodes: Vec<NodeIndex>,
    pub notary_node: NodeIndex,
    pub map_node: NodeIndex,
}

impl MockNetwork {
    fn require_empty(&self) -> Result<(), MockNetworkError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(MockNetworkError::RegistryNotEmpty(self.len()))
        }
    }

    fn address_of(&self, index: NodeIndex) -> PeerAddress {
        self.nodes()[index].address()
    }

    /// Build a network map node, a simple notary and `num_party_nodes`
    /// parties registered with the map, on an empty network.
    ///
    /// The notary's service key is `notary_key`, the well-known dummy notary
    /// key by default. Every party learns every other party's identity.
    pub fn create_some_nodes(
        &mut self,
        num_party_nodes: usize,
        factory: Option<Arc<dyn NodeFactory>>,
        notary_key: Option<KeyPair>,
    ) -> Result<BasketOfNodes, MockNetworkError> {
        self.require_empty()?;
        let with_factory = |params: NodeParams| match &factory {
            Some(factory) => params.with_factory(Arc::clone(factory)),
            None => params,
        };

        let map_node = self.create_node(with_factory(
            NodeParams::new().with_service_kind(ServiceKind::NetworkMap),
        ))?;
        let map_address = self.address_of(map_node);

        let notary_key = notary_key.unwrap_or_else(dummy_notary_key);
        let notary_overrides =
            ServiceKeyOverrides::new().with(ServiceKind::SimpleNotary, notary_key);
        let notary_node = self.create_node(with_factory(
            NodeParams::new()
                .with_network_map(map_address)
                .with_service_kind(ServiceKind::SimpleNotary)
                .with_overrides(notary_overrides),
        ))?;

        let party_nodes = (0..num_party_nodes)
            .map(|_| {
                self.create_node(with_factory(NodeParams::new().with_network_map(map_address)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let parties: Vec<_> = party_nodes
            .iter()
            .filter_map(|&index| self.nodes()[index].legal_identity().cloned())
            .collect();
        for &index in &party_nodes {
            let identities = self.nodes()[index].identity_service();
            for party in &parties {
                identities.register_identity(party.clone());
            }
        }

        info!(
            parties = party_nodes.len(),
            map = %map_address,
            "Created basket of nodes"
        );
        Ok(BasketOfNodes {
            party_nodes,
            notary_node,
            map_node,
        })
    }

    /// A node running both the network map and a validating notary.
    pub fn create_notary_node(
        &mut self,
        network_map_address: Option<PeerAddress>,
        legal_name: Option<String>,
        overrides: ServiceKeyOverrides,
        service_name: Option<String>,
    ) -> Result<NodeIndex, MockNetworkError> {
        let notary = match service_name {
            Some(name) => ServiceInfo::named(ServiceKind::ValidatingNotary, name),
            None => ServiceInfo::new(ServiceKind::ValidatingNotary),
        };
        let mut params = NodeParams::new()
            .with_service_kind(ServiceKind::NetworkMap)
            .with_service(notary)
            .with_overrides(overrides);
        params.network_map_address = network_map_address;
        params.legal_name = legal_name;
        self.create_node(params)
    }

    /// A node advertising no services.
    pub fn create_party_node(
        &mut self,
        network_map_address: PeerAddress,
        legal_name: Option<String>,
        overrides: ServiceKeyOverrides,
    ) -> Result<NodeIndex, MockNetworkError> {
        let mut params = NodeParams::new()
            .with_network_map(network_map_address)
            .with_overrides(overrides);
        params.legal_name = legal_name;
        self.create_node(params)
    }

    /// On an empty network: a network map that is also a simple notary, and
    /// one party registered with it.
    pub fn create_two_nodes(&mut self) -> Result<(NodeIndex, NodeIndex), MockNetworkError> {
        self.require_empty()?;
        let first = self.create_node(
            NodeParams::new()
                .with_service_kind(ServiceKind::NetworkMap)
                .with_service_kind(ServiceKind::SimpleNotary)
                .with_overrides(
                    ServiceKeyOverrides::new().with(ServiceKind::SimpleNotary, dummy_notary_key()),
                ),
        )?;
        let map_address = self.address_of(first);
        let second = self.create_node(NodeParams::new().with_network_map(map_address))?;
        Ok((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockNetworkConfig;
    use mocknet_types::NodeId;

    fn network() -> MockNetwork {
        MockNetwork::new(MockNetworkConfig::default()).unwrap()
    }

    #[test]
    fn test_create_some_nodes_shape() {
        let mut net = network();
        let basket = net.create_some_nodes(3, None, None).unwrap();

        assert_eq!(basket.map_node, 0);
        assert_eq!(basket.notary_node, 1);
        assert_eq!(basket.party_nodes, vec![2, 3, 4]);
        assert_eq!(net.len(), 5);

        let map_address = net.node(basket.map_node).unwrap().address();
        for &index in basket.party_nodes.iter().chain([basket.notary_node].iter()) {
            assert_eq!(net.node(index).unwrap().network_map_address(), Some(map_address));
        }
    }

    #[test]
    fn test_create_some_nodes_requires_empty_registry() {
        let mut net = network();
        net.create_node(NodeParams::new()).unwrap();
        assert_eq!(
            net.create_some_nodes(2, None, None),
            Err(MockNetworkError::RegistryNotEmpty(1))
        );
    }

    #[test]
    fn test_notary_uses_dummy_key_by_default() {
        let mut net = network();
        let basket = net.create_some_nodes(1, None, None).unwrap();
        let notary = net.node(basket.notary_node).unwrap();
        let identity = notary
            .info()
            .unwrap()
            .service_identity(&ServiceInfo::new(ServiceKind::SimpleNotary))
            .unwrap();
        assert_eq!(identity.owning_key, dummy_notary_key().public_key());
    }

    #[test]
    fn test_parties_know_each_other() {
        let mut net = network();
        let basket = net.create_some_nodes(3, None, None).unwrap();
        for &index in &basket.party_nodes {
            let identities = net.node(index).unwrap().identity_service();
            for &other in &basket.party_nodes {
                let name = &net.node(other).unwrap().config().legal_name;
                assert!(identities.party_from_name(name).is_some());
            }
        }
    }

    #[test]
    fn test_notary_node_advertises_map_and_validating_notary() {
        let mut net = network();
        let index = net
            .create_notary_node(
                None,
                Some("Notary Service".into()),
                ServiceKeyOverrides::new(),
                Some("notaries".into()),
            )
            .unwrap();
        let node = net.node(index).unwrap();
        assert_eq!(
            node.advertised_services(),
            &[
                ServiceInfo::new(ServiceKind::NetworkMap),
                ServiceInfo::named(ServiceKind::ValidatingNotary, "notaries"),
            ]
        );
        assert_eq!(node.config().legal_name, "Notary Service");
        let notary_address = node.address();

        let party = net
            .create_party_node(notary_address, None, ServiceKeyOverrides::new())
            .unwrap();
        assert!(net.node(party).unwrap().advertised_services().is_empty());
        assert_eq!(net.node(party).unwrap().id(), NodeId(1));
    }

    #[test]
    fn test_two_nodes_register_after_pumping() {
        let mut net = network();
        let (map, party) = net.create_two_nodes().unwrap();
        assert!(!net.node(party).unwrap().registration().is_complete());

        net.run_network().unwrap();
        net.node(party).unwrap().ensure_registered().unwrap();
        assert_eq!(net.node(map).unwrap().network_map_registrations().len(), 2);
    }
}
