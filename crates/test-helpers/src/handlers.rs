//! Message handlers for driving traffic in tests.

use mocknet_core::{Message, Outbound, ReceivedMessage, TopicSession};
use parking_lot::Mutex;
use std::sync::Arc;

pub const PING_TOPIC: &str = "test.ping";
pub const PONG_TOPIC: &str = "test.pong";

pub fn ping_message() -> Message {
    Message::new(TopicSession::topic(PING_TOPIC), b"ping".to_vec())
}

pub fn pong_message() -> Message {
    Message::new(TopicSession::topic(PONG_TOPIC), b"pong".to_vec())
}

/// Answers every ping with one pong.
pub fn answer_pings() -> impl FnMut(&ReceivedMessage) -> Vec<Outbound> + Send {
    |message: &ReceivedMessage| {
        vec![Outbound::reply(
            message,
            TopicSession::topic(PONG_TOPIC),
            b"pong".to_vec(),
        )]
    }
}

/// Answers every pong with a ping. Paired with [`answer_pings`] this never
/// goes quiet.
pub fn answer_pongs() -> impl FnMut(&ReceivedMessage) -> Vec<Outbound> + Send {
    |message: &ReceivedMessage| {
        vec![Outbound::reply(
            message,
            TopicSession::topic(PING_TOPIC),
            b"ping".to_vec(),
        )]
    }
}

/// Replies with the received payload on `reply_topic`.
pub fn echo(reply_topic: &str) -> impl FnMut(&ReceivedMessage) -> Vec<Outbound> + Send {
    let reply_topic = TopicSession::topic(reply_topic);
    move |message: &ReceivedMessage| {
        vec![Outbound::reply(message, reply_topic.clone(), message.data.clone())]
    }
}

/// Records every message it is handed, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Arc<Mutex<Vec<ReceivedMessage>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that appends to this log and replies with nothing.
    pub fn recorder(&self) -> impl FnMut(&ReceivedMessage) -> Vec<Outbound> + Send {
        let messages = Arc::clone(&self.messages);
        move |message: &ReceivedMessage| {
            messages.lock().push(message.clone());
            Vec::new()
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn messages(&self) -> Vec<ReceivedMessage> {
        self.messages.lock().clone()
    }
}
