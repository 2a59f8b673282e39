//! Pluggable node construction.

use crate::{MockNode, NetworkContext, NodeConfig, NodeError};
use mocknet_types::{NodeId, PeerAddress, ServiceInfo, ServiceKeyOverrides};
use std::sync::Arc;

/// Everything a factory receives to build one node.
#[derive(Debug)]
pub struct MockNodeArgs {
    pub context: NetworkContext,
    pub config: NodeConfig,
    pub network_map_address: Option<PeerAddress>,
    pub advertised_services: Vec<ServiceInfo>,
    pub id: NodeId,
    pub overrides: ServiceKeyOverrides,
    pub entropy_root: u64,
}

/// Builds mock nodes.
///
/// Implement this to customise nodes, typically by building the default
/// [`MockNode`] and then installing message handlers on it before it starts.
pub trait NodeFactory: Send + Sync {
    fn create(&self, args: MockNodeArgs) -> Result<MockNode, NodeError>;
}

/// Builds plain [`MockNode`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl NodeFactory for DefaultFactory {
    fn create(&self, args: MockNodeArgs) -> Result<MockNode, NodeError> {
        MockNode::new(args)
    }
}

/// Hook run on every node a [`CustomizingFactory`] builds.
pub type NodeCustomizer = dyn Fn(&mut MockNode) + Send + Sync;

/// Builds default nodes, then runs a customisation hook on each.
#[derive(Clone)]
pub struct CustomizingFactory {
    customize: Arc<NodeCustomizer>,
}

impl CustomizingFactory {
    pub fn new(customize: impl Fn(&mut MockNode) + Send + Sync + 'static) -> Self {
        Self {
            customize: Arc::new(customize),
        }
    }

    /// The factory as a shareable trait object.
    pub fn shared(self) -> Arc<dyn NodeFactory> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for CustomizingFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomizingFactory").finish_non_exhaustive()
    }
}

impl NodeFactory for CustomizingFactory {
    fn create(&self, args: MockNodeArgs) -> Result<MockNode, NodeError> {
        let mut node = MockNode::new(args)?;
        (self.customize)(&mut node);
        Ok(node)
    }
}
