//! Pluggable connect/receive boundary used by the stream session

use async_trait::async_trait;

use crate::error::Result;

/// A connection to one logical feed.
///
/// `recv` must be cancel-safe: the session races it against stop requests
/// and the idle timeout.
#[async_trait]
pub trait FeedTransport: Send {
    /// Open the connection, replacing any previous one
    async fn connect(&mut self) -> Result<()>;

    /// Next frame: `Some(text)` for a data frame, `None` for a control frame.
    ///
    /// Returns `FeedError::Closed` when the peer ends the stream and another
    /// error on transport failure.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Liveness ping on an otherwise quiet connection
    async fn ping(&mut self) -> Result<()>;

    /// Release the connection; safe to call when not connected
    async fn close(&mut self);

    fn is_connected(&self) -> bool;
}
