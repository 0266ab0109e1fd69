//! Transport facade traits

use bytes::Bytes;
use std::time::Duration;

use crate::Result;
use crate::types::Frame;

/// Addressable socket for the chunked protocol (router role on both ends)
///
/// Every send and receive moves exactly one [`Frame`]. A socket that binds
/// takes the endpoint string as its own identity, so a connecting peer can
/// address it by that endpoint.
///
/// `recv` returns:
/// - `Ok(frame)` - one frame, `frame.address` is the sending peer
/// - `Err(ChunkcastError::Terminated)` - the owning context was terminated
/// - `Err(e)` - any other transport failure
#[async_trait::async_trait]
pub trait RouterSocket: Send + 'static {
    /// Bind to an endpoint and adopt it as this socket's identity
    async fn bind(&mut self, endpoint: &str) -> Result<()>;

    /// Connect to a bound peer
    async fn connect(&mut self, endpoint: &str) -> Result<()>;

    /// Send one frame to `frame.address`
    ///
    /// A frame for a peer that is not connected is dropped, not an error.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Wait for one frame
    async fn recv(&mut self) -> Result<Frame>;

    /// Release the socket. Zero linger drops anything not yet sent.
    async fn close(&mut self, linger: Duration) -> Result<()>;
}

/// Subscribe-role socket for the push channel
///
/// Filtering by subscription prefix happens inside the transport: a message
/// whose first part matches no subscription is never returned by `recv`.
#[async_trait::async_trait]
pub trait SubscribeSocket: Send + 'static {
    /// Connect to a publishing endpoint
    async fn connect(&mut self, endpoint: &str) -> Result<()>;

    /// Accept messages whose first part starts with `prefix`
    async fn subscribe(&mut self, prefix: &[u8]) -> Result<()>;

    /// Remove one earlier subscription to `prefix`
    async fn unsubscribe(&mut self, prefix: &[u8]) -> Result<()>;

    /// Wait for one multi-part message
    async fn recv(&mut self) -> Result<Vec<Bytes>>;

    /// Release the socket. Zero linger drops anything still queued.
    async fn close(&mut self, linger: Duration) -> Result<()>;
}

/// Publish-role socket for the push channel
#[async_trait::async_trait]
pub trait PublishSocket: Send + 'static {
    /// Bind to an endpoint subscribers can connect to
    async fn bind(&mut self, endpoint: &str) -> Result<()>;

    /// Send one multi-part message to every matching subscriber
    async fn send(&mut self, parts: Vec<Bytes>) -> Result<()>;

    /// Release the socket
    async fn close(&mut self, linger: Duration) -> Result<()>;
}
