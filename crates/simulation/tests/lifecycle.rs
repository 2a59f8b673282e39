//! Tests for node registration, start/stop, and the shared worker.

use mocknet_core::TopicSession;
use mocknet_network::NetworkError;
use mocknet_simulation::{MockNetwork, MockNetworkConfig, MockNetworkError, NodeError, NodeParams};
use mocknet_test_helpers::{ping_message, MessageLog, PING_TOPIC};
use mocknet_types::{NodeId, PeerAddress};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

fn network() -> MockNetwork {
    MockNetwork::new(MockNetworkConfig::default()).unwrap()
}

#[test]
fn test_ids_assigned_in_creation_order() {
    let mut network = network();
    let indices: Vec<_> = (0..5)
        .map(|_| network.create_node(NodeParams::new()).unwrap())
        .collect();
    let ids: Vec<_> = indices
        .iter()
        .map(|&index| network.node(index).unwrap().id())
        .collect();
    assert_eq!(ids, (0..5).map(NodeId).collect::<Vec<_>>());
}

#[test]
fn test_shared_worker_torn_down_after_last_stop() {
    for order in [[0, 1, 2], [2, 1, 0], [1, 0, 2]] {
        let mut network = network();
        let nodes: Vec<_> = (0..3)
            .map(|_| network.create_node(NodeParams::new()).unwrap())
            .collect();
        let worker = Arc::clone(network.shared_worker());
        assert_eq!(worker.holders(), 3);

        for (stopped, &position) in order.iter().enumerate() {
            network.node_mut(nodes[position]).unwrap().stop();
            let expected = usize::from(stopped == 2);
            assert_eq!(worker.teardown_count(), expected);
        }
        assert!(worker.is_shutdown());
    }
}

#[traced_test]
#[test]
fn test_negative_forced_id_fails_start_but_stays_registered() {
    let mut network = network();
    let result = network.create_node(NodeParams::new().with_forced_id(NodeId(-1)));

    assert_eq!(
        result,
        Err(MockNetworkError::Node(NodeError::Messaging(
            NetworkError::InvalidNodeId(NodeId(-1))
        )))
    );
    assert_eq!(network.len(), 1);
    assert!(!network.node(0).unwrap().is_started());
    // Registered nodes hold the shared worker whether or not they run.
    assert_eq!(network.shared_worker().holders(), 1);
}

#[test]
fn test_start_and_stop_only_touch_nodes_in_other_state() {
    let mut network = network();
    let started = network.create_node(NodeParams::new()).unwrap();
    let unstarted = network.create_unstarted_node(NodeParams::new()).unwrap();
    assert_eq!(network.shared_worker().holders(), 2);

    network.start_nodes().unwrap();
    assert!(network.node(unstarted).unwrap().is_started());
    assert_eq!(network.shared_worker().holders(), 2);

    network.node_mut(started).unwrap().stop();
    network.stop_nodes();
    assert_eq!(network.shared_worker().teardown_count(), 1);
}

#[test]
fn test_unstarted_node_keeps_shared_worker_alive() {
    let mut network = network();
    let running = network.create_node(NodeParams::new()).unwrap();
    let waiting = network.create_unstarted_node(NodeParams::new()).unwrap();

    network.node_mut(running).unwrap().stop();
    assert_eq!(network.shared_worker().teardown_count(), 0);

    network.start_nodes().unwrap();
    assert!(network.node(running).unwrap().is_started());
    assert!(network.node(waiting).unwrap().is_started());
}

#[test]
fn test_messages_for_stopped_node_do_not_block_quiescence() {
    let log = MessageLog::new();
    let mut network = network();
    let sender = network.create_node(NodeParams::new()).unwrap();
    let stopped = network.create_node(NodeParams::new()).unwrap();
    network
        .node_mut(stopped)
        .unwrap()
        .add_message_handler(TopicSession::topic(PING_TOPIC), log.recorder());
    network.node_mut(stopped).unwrap().stop();

    let target = network.node(stopped).unwrap().address();
    network.node(sender).unwrap().send(target, ping_message()).unwrap();
    assert_eq!(network.run_network().unwrap(), 0);
    assert!(network.wait_quiescent_timeout(Duration::from_secs(2)));

    network.node_mut(stopped).unwrap().start().unwrap();
    assert_eq!(network.busy().count(), 1);
    assert_eq!(network.run_network().unwrap(), 1);
    assert_eq!(log.len(), 1);
    assert!(network.wait_quiescent_timeout(Duration::from_secs(2)));
}

#[test]
fn test_restarted_node_keeps_identity_and_handlers() {
    let log = MessageLog::new();
    let mut network = network();
    let keeper = network.create_node(NodeParams::new()).unwrap();
    let restarting = network.create_node(NodeParams::new()).unwrap();
    network
        .node_mut(restarting)
        .unwrap()
        .add_message_handler(TopicSession::topic(PING_TOPIC), log.recorder());
    let identity = network.node(restarting).unwrap().legal_identity().cloned();

    network.node_mut(restarting).unwrap().stop();
    let target = network.node(restarting).unwrap().address();
    network.node(keeper).unwrap().send(target, ping_message()).unwrap();
    network.run_network().unwrap();
    assert!(log.is_empty());

    network.node_mut(restarting).unwrap().start().unwrap();
    assert_eq!(network.node(restarting).unwrap().legal_identity().cloned(), identity);
    network.run_network().unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn test_unknown_network_map_fails_registration() {
    let mut network = network();
    let index = network
        .create_node(NodeParams::new().with_network_map(PeerAddress::new(NodeId(42))))
        .unwrap();

    let result = network.node(index).unwrap().ensure_registered();
    assert!(matches!(
        result,
        Err(NodeError::Registration { node: NodeId(0), .. })
    ));
}

#[test]
fn test_wait_quiescent_after_scheduled_work() {
    let mut network = network();
    let index = network.create_node(NodeParams::new()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        network
            .node(index)
            .unwrap()
            .execute_async(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    network.wait_quiescent();
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn test_stopped_node_cannot_schedule_work() {
    let mut network = network();
    let index = network.create_node(NodeParams::new()).unwrap();
    network.node_mut(index).unwrap().stop();

    assert_eq!(
        network.node(index).unwrap().execute_async(|| {}),
        Err(NodeError::NotStarted(NodeId(0)))
    );
}
