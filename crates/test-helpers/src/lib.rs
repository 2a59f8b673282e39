//! Test helpers for the mock network.
//!
//! Provides handlers that generate predictable traffic, node factories that
//! install them, and a tracing setup for tests that want log output.
//!
//! # Example
//!
//! ```rust
//! use mocknet_simulation::{MockNetwork, MockNetworkConfig, NodeParams};
//! use mocknet_test_helpers::{ping_message, ping_pong_factory, PongMode};
//!
//! let mut network = MockNetwork::new(MockNetworkConfig::default()).unwrap();
//! let factory = ping_pong_factory(PongMode::Stop, None);
//! let a = network.create_node(NodeParams::new().with_factory(factory.clone())).unwrap();
//! let b = network.create_node(NodeParams::new().with_factory(factory)).unwrap();
//!
//! let target = network.node(b).unwrap().address();
//! network.node(a).unwrap().send(target, ping_message()).unwrap();
//! assert_eq!(network.run_network().unwrap(), 2);
//! ```

mod handlers;

pub use handlers::{
    answer_pings, answer_pongs, echo, ping_message, pong_message, MessageLog, PING_TOPIC,
    PONG_TOPIC,
};

use mocknet_core::TopicSession;
use mocknet_simulation::{CustomizingFactory, NodeFactory};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// What a node does when it receives a pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PongMode {
    /// Swallow it; a single ping produces exactly two deliveries.
    Stop,
    /// Answer with another ping, forever.
    Forever,
}

/// A factory whose nodes answer pings with pongs.
///
/// Received pongs are recorded in `log` when given.
pub fn ping_pong_factory(mode: PongMode, log: Option<MessageLog>) -> Arc<dyn NodeFactory> {
    CustomizingFactory::new(move |node| {
        node.add_message_handler(TopicSession::topic(PING_TOPIC), answer_pings());
        match (mode, &log) {
            (PongMode::Forever, _) => {
                node.add_message_handler(TopicSession::topic(PONG_TOPIC), answer_pongs())
            }
            (PongMode::Stop, Some(log)) => {
                node.add_message_handler(TopicSession::topic(PONG_TOPIC), log.recorder())
            }
            (PongMode::Stop, None) => {}
        }
    })
    .shared()
}

/// A factory whose nodes record every message on `topic` into `log`.
pub fn recording_factory(topic: &str, log: MessageLog) -> Arc<dyn NodeFactory> {
    let topic = TopicSession::topic(topic);
    CustomizingFactory::new(move |node| {
        node.add_message_handler(topic.clone(), log.recorder());
    })
    .shared()
}

/// Install a test-friendly tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
