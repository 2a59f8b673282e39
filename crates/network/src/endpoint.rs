//! Per-node messaging endpoints.

use crate::{InMemoryMessagingNetwork, NetworkError};
use mocknet_core::{Message, MessageHandler, MessageId, ReceivedMessage, TopicSession};
use mocknet_dispatch::{NodeDispatch, WorkerError};
use mocknet_types::{MessageRecipient, PeerAddress};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

type HandlerMap = HashMap<TopicSession, Box<dyn MessageHandler>>;

struct EndpointInner {
    address: PeerAddress,
    description: String,
    fabric: InMemoryMessagingNetwork,
    dispatch: NodeDispatch,
    handlers: Arc<Mutex<HandlerMap>>,
    running: AtomicBool,
}

impl EndpointInner {
    fn pump_receive(&self, block: bool) -> Result<Option<ReceivedMessage>, NetworkError> {
        let Some(transfer) = self.fabric.take_next(self.address, block) else {
            return Ok(None);
        };
        let received = ReceivedMessage::from(transfer);
        let result = self.deliver(received.clone());
        // Replies were sent inside `deliver`, so the counter cannot touch zero early.
        self.fabric.busy().decrement();
        result.map(|()| Some(received))
    }

    fn deliver(&self, received: ReceivedMessage) -> Result<(), NetworkError> {
        let id = received.id;
        let topic_session = received.topic_session.clone();
        let handlers = Arc::clone(&self.handlers);
        let outbound = self.dispatch.run(move || {
            handlers
                .lock()
                .get_mut(&received.topic_session)
                .map(|handler| handler.handle(&received))
        })?;

        let Some(outbound) = outbound else {
            warn!(
                address = %self.address,
                topic = %topic_session,
                message = %id,
                "No handler registered for topic, dropping message"
            );
            self.fabric.record_unhandled();
            return Ok(());
        };

        trace!(
            address = %self.address,
            message = %id,
            replies = outbound.len(),
            "Delivered message"
        );
        self.fabric.record_delivered();
        for out in outbound {
            if let Err(e) = self.fabric.send(self.address, out.recipient, out.message) {
                warn!(address = %self.address, error = %e, "Handler output could not be routed");
            }
        }
        Ok(())
    }
}

/// One node's connection to the fabric.
///
/// Manually pumped endpoints deliver only from
/// [`pump_receive`](Self::pump_receive). Otherwise a receive thread blocks on
/// the inbox and delivers messages as they arrive. Either way each handler
/// runs on the node's executor.
pub struct InMemoryEndpoint {
    inner: Arc<EndpointInner>,
    receive_thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for InMemoryEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEndpoint")
            .field("address", &self.inner.address)
            .field("description", &self.inner.description)
            .field("running", &self.is_running())
            .finish()
    }
}

impl InMemoryEndpoint {
    pub(crate) fn start(
        fabric: InMemoryMessagingNetwork,
        address: PeerAddress,
        description: String,
        dispatch: NodeDispatch,
        manually_pumped: bool,
    ) -> Result<Self, NetworkError> {
        let inner = Arc::new(EndpointInner {
            address,
            description,
            fabric,
            dispatch,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            running: AtomicBool::new(true),
        });

        let receive_thread = if manually_pumped {
            None
        } else {
            let receiver = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("{address}-receive"))
                .spawn(move || receive_loop(&receiver))
                .map_err(|e| NetworkError::Worker(WorkerError::Spawn(e.to_string())))?;
            Some(handle)
        };

        Ok(Self {
            inner,
            receive_thread: Mutex::new(receive_thread),
        })
    }

    pub fn address(&self) -> PeerAddress {
        self.inner.address
    }

    pub fn dispatch(&self) -> &NodeDispatch {
        &self.inner.dispatch
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Whether this endpoint delivers from its own receive thread.
    pub fn has_receive_thread(&self) -> bool {
        self.receive_thread.lock().is_some()
    }

    /// Send a message from this endpoint.
    pub fn send(
        &self,
        recipient: impl Into<MessageRecipient>,
        message: Message,
    ) -> Result<MessageId, NetworkError> {
        if !self.is_running() {
            return Err(NetworkError::EndpointStopped(self.inner.address));
        }
        self.inner
            .fabric
            .send(self.inner.address, recipient.into(), message)
    }

    /// Install the handler for a topic session, replacing any previous one.
    pub fn add_message_handler(
        &self,
        topic_session: TopicSession,
        handler: impl MessageHandler + 'static,
    ) {
        let replaced = self
            .inner
            .handlers
            .lock()
            .insert(topic_session.clone(), Box::new(handler))
            .is_some();
        debug!(
            address = %self.inner.address,
            topic = %topic_session,
            replaced,
            "Added message handler"
        );
    }

    /// Deliver the next inbound message, if any, and wait for its handler.
    ///
    /// With `block`, waits for a message to arrive. Returns `Ok(None)` when
    /// nothing was delivered.
    pub fn pump_receive(&self, block: bool) -> Result<Option<ReceivedMessage>, NetworkError> {
        self.inner.pump_receive(block)
    }

    /// Stop receiving. Pending inbox messages stay queued for a restart.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.fabric.stop_endpoint(self.inner.address);
        if let Some(handle) = self.receive_thread.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        debug!(address = %self.inner.address, "Stopped endpoint");
    }
}

impl Drop for InMemoryEndpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(endpoint: &EndpointInner) {
    loop {
        match endpoint.pump_receive(true) {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(NetworkError::Worker(WorkerError::ShutDown(worker))) => {
                debug!(address = %endpoint.address, %worker, "Executor gone, receive loop exiting");
                break;
            }
            Err(e) => warn!(address = %endpoint.address, error = %e, "Delivery failed"),
        }
    }
}
