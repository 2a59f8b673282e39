//! Core trait for node-side message processing.

use crate::{Outbound, ReceivedMessage};

/// Processes messages delivered to one topic of one node.
///
/// Handlers follow the same contract as every piece of node logic in the
/// harness:
///
/// - **Synchronous**: No async, no `.await`, no blocking on other nodes
/// - **Deterministic**: Same state + message = same outbound messages
/// - **No I/O**: Sends are returned, and the endpoint performs them after the
///   handler returns
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl MessageHandler for Echo {
///     fn handle(&mut self, message: &ReceivedMessage) -> Vec<Outbound> {
///         vec![Outbound::reply(message, TopicSession::topic("echo.reply"), message.data.clone())]
///     }
/// }
/// ```
pub trait MessageHandler: Send {
    /// Process a delivered message, returning messages to send.
    ///
    /// Runs on the node's executor. Under the shared worker every handler in
    /// the network runs on the same thread, one delivery at a time.
    fn handle(&mut self, message: &ReceivedMessage) -> Vec<Outbound>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&ReceivedMessage) -> Vec<Outbound> + Send,
{
    fn handle(&mut self, message: &ReceivedMessage) -> Vec<Outbound> {
        self(message)
    }
}
