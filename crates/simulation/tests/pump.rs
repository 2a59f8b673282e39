//! Tests for deterministic message pumping.

use mocknet_core::{Message, TopicSession};
use mocknet_simulation::{
    CustomizingFactory, MockNetwork, MockNetworkConfig, MockNetworkError, NodeParams,
};
use mocknet_test_helpers::{
    echo, init_tracing, ping_message, ping_pong_factory, recording_factory, MessageLog, PongMode,
};
use mocknet_types::NodeIndex;

/// Two nodes answering pings, created on a fresh network.
fn ping_pong_pair(mode: PongMode, log: Option<MessageLog>) -> (MockNetwork, NodeIndex, NodeIndex) {
    let mut network = MockNetwork::new(MockNetworkConfig::default()).unwrap();
    let factory = ping_pong_factory(mode, log);
    let a = network
        .create_node(NodeParams::new().with_factory(factory.clone()))
        .unwrap();
    let b = network
        .create_node(NodeParams::new().with_factory(factory))
        .unwrap();
    (network, a, b)
}

fn network_with_defaults() -> MockNetwork {
    MockNetwork::new(MockNetworkConfig::default()).unwrap()
}

fn send_ping(network: &MockNetwork, from: NodeIndex, to: NodeIndex) {
    let target = network.node(to).unwrap().address();
    network.node(from).unwrap().send(target, ping_message()).unwrap();
}

#[test]
fn test_single_reply_runs_to_quiescence() {
    let log = MessageLog::new();
    let (mut network, a, b) = ping_pong_pair(PongMode::Stop, Some(log.clone()));
    send_ping(&network, a, b);

    let delivered = network.run_network().unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(log.len(), 1);
    assert_eq!(log.messages()[0].sender, network.node(b).unwrap().address());
    assert_eq!(network.fabric().total_pending_messages(), 0);
    assert!(network.busy().is_idle());
}

#[test]
fn test_one_round_delivers_one_message_of_endless_exchange() {
    let (mut network, a, b) = ping_pong_pair(PongMode::Forever, None);
    send_ping(&network, a, b);

    assert_eq!(network.run_network_rounds(1).unwrap(), 1);
    // The pong is now waiting for node a.
    assert_eq!(network.fabric().pending_messages(network.node(a).unwrap().address()), 1);

    // From here on both nodes deliver once per round.
    assert_eq!(network.run_network_rounds(3).unwrap(), 6);
    assert!(!network.busy().is_idle());
}

#[test]
fn test_rounds_run_even_when_idle() {
    let (mut network, _, _) = ping_pong_pair(PongMode::Stop, None);
    assert_eq!(network.run_network_rounds(5).unwrap(), 0);
    assert_eq!(network.run_network().unwrap(), 0);
}

#[test]
fn test_run_network_requires_automatic_sends() {
    let mut network =
        MockNetwork::new(MockNetworkConfig::default().with_network_send_manually_pumped(true))
            .unwrap();
    network.create_node(NodeParams::new()).unwrap();

    assert_eq!(network.run_network(), Err(MockNetworkError::SendManuallyPumped));
}

#[test]
fn test_manual_send_pumping_delivers_on_request() {
    let log = MessageLog::new();
    let mut network =
        MockNetwork::new(MockNetworkConfig::default().with_network_send_manually_pumped(true))
            .unwrap();
    let factory = ping_pong_factory(PongMode::Stop, Some(log.clone()));
    let a = network
        .create_node(NodeParams::new().with_factory(factory.clone()))
        .unwrap();
    let b = network
        .create_node(NodeParams::new().with_factory(factory))
        .unwrap();
    send_ping(&network, a, b);
    assert_eq!(network.fabric().queued_sends(), 1);

    let routed = network.pump_send().unwrap().unwrap();
    assert_eq!(routed.sender, network.node(a).unwrap().address());
    assert!(network.node(b).unwrap().pump_receive(false).unwrap().is_some());

    // The pong sits in the send queue until pumped.
    assert!(network.node(a).unwrap().pump_receive(false).unwrap().is_none());
    network.pump_send().unwrap().unwrap();
    assert!(network.node(a).unwrap().pump_receive(false).unwrap().is_some());
    assert_eq!(log.len(), 1);
    assert!(network.pump_send().unwrap().is_none());
}

#[test]
fn test_stats_track_deliveries() {
    let (mut network, a, b) = ping_pong_pair(PongMode::Stop, None);
    send_ping(&network, a, b);
    network.run_network().unwrap();

    let stats = network.stats();
    assert_eq!(stats.messages_sent, 2);
    assert_eq!(stats.messages_delivered, 1);
    // Pongs have no handler in this configuration.
    assert_eq!(stats.dropped_unhandled, 1);
}

#[test]
fn test_echo_reply_is_recorded() {
    init_tracing();
    let log = MessageLog::new();
    let mut network = network_with_defaults();
    let recorder = recording_factory("test.echo.reply", log.clone());
    let client = network
        .create_node(NodeParams::new().with_factory(recorder))
        .unwrap();
    let echo_factory = CustomizingFactory::new(|node| {
        node.add_message_handler(TopicSession::topic("test.echo"), echo("test.echo.reply"));
    })
    .shared();
    let server = network
        .create_node(
            NodeParams::new()
                .with_factory(echo_factory)
                .with_legal_name("Echo Service"),
        )
        .unwrap();
    assert_eq!(network.node(server).unwrap().config().legal_name, "Echo Service");

    let target = network.node(server).unwrap().address();
    let request = Message::new(TopicSession::topic("test.echo"), b"hello".to_vec());
    network.node(client).unwrap().send(target, request).unwrap();

    assert_eq!(network.run_network().unwrap(), 2);
    let replies = log.messages();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].data, b"hello".to_vec());
    assert_eq!(replies[0].sender, target);
}
