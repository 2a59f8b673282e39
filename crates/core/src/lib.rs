//! Core types for the mock network.
//!
//! - [`Message`], [`MessageTransfer`], [`ReceivedMessage`], [`Outbound`]:
//!   what travels between nodes
//! - [`MessageHandler`]: node-side processing of one topic
//! - [`Readiness`]: one-shot signals nodes and replicas complete when ready
//! - [`BusyCounter`]: network-wide outstanding-work tracking for quiescence

mod busy;
mod message;
mod readiness;
mod traits;

pub use busy::{BusyCounter, BusyToken};
pub use message::{Message, MessageId, MessageTransfer, Outbound, ReceivedMessage, TopicSession};
pub use readiness::{Readiness, ReadinessError};
pub use traits::MessageHandler;
