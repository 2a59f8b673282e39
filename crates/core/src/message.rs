//! Messages exchanged between mock nodes.

use mocknet_types::{MessageRecipient, PeerAddress};
use std::fmt;

/// Opaque identifier for one sent message, unique within a fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Create a new message ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Topic plus session: the key handlers are registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicSession {
    pub topic: String,
    pub session_id: u64,
}

impl TopicSession {
    /// Session id used for messages that do not belong to a session.
    pub const BLANK_SESSION: u64 = 0;

    pub fn new(topic: impl Into<String>, session_id: u64) -> Self {
        Self {
            topic: topic.into(),
            session_id,
        }
    }

    /// A topic with the blank session.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self::new(topic, Self::BLANK_SESSION)
    }
}

impl fmt::Display for TopicSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.topic, self.session_id)
    }
}

/// A message payload addressed to a topic session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic_session: TopicSession,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(topic_session: TopicSession, data: impl Into<Vec<u8>>) -> Self {
        Self {
            topic_session,
            data: data.into(),
        }
    }
}

/// A message in flight: who sent it, to whom, and its fabric-wide id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTransfer {
    pub id: MessageId,
    pub sender: PeerAddress,
    pub recipient: MessageRecipient,
    pub message: Message,
}

impl fmt::Display for MessageTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} to {} on {}",
            self.id, self.sender, self.recipient, self.message.topic_session
        )
    }
}

/// A message as seen by the handler of the receiving node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub id: MessageId,
    pub sender: PeerAddress,
    pub topic_session: TopicSession,
    pub data: Vec<u8>,
}

impl From<MessageTransfer> for ReceivedMessage {
    fn from(transfer: MessageTransfer) -> Self {
        Self {
            id: transfer.id,
            sender: transfer.sender,
            topic_session: transfer.message.topic_session,
            data: transfer.message.data,
        }
    }
}

/// A message a handler wants sent once it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub recipient: MessageRecipient,
    pub message: Message,
}

impl Outbound {
    pub fn new(recipient: impl Into<MessageRecipient>, message: Message) -> Self {
        Self {
            recipient: recipient.into(),
            message,
        }
    }

    /// Reply to the sender of a received message on the given topic session.
    pub fn reply(
        to: &ReceivedMessage,
        topic_session: TopicSession,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(to.sender, Message::new(topic_session, data))
    }
}
