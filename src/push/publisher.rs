//! Keyed push publisher

use bytes::Bytes;
use std::time::Duration;
use tracing::{info, trace};

use crate::Result;
use crate::config::PushConfig;
use crate::transport::PublishSocket;
use crate::types::SubscriptionKey;

/// Publish-socket server side of the push pattern
///
/// Every message goes out as `(key, source, payload)`, where `source` is the
/// configured host tag.
pub struct PushPublisher<P> {
    socket: P,
    source: Bytes,
    published: u64,
}

impl<P: PublishSocket> PushPublisher<P> {
    /// Bind `socket` to `endpoint`
    pub async fn bind(mut socket: P, endpoint: &str, config: &PushConfig) -> Result<Self> {
        socket.bind(endpoint).await?;
        info!("PUSH publisher bound to [{}] as [{}].", endpoint, config.source);
        Ok(Self { socket, source: Bytes::from(config.source.clone()), published: 0 })
    }

    /// Send `payload` to every subscriber of `key`
    ///
    /// Delivery is best effort; subscribers that are not connected yet, or
    /// whose queues are full, miss the message.
    pub async fn publish(&mut self, key: &SubscriptionKey, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        trace!("Publishing {} bytes for [{}]", payload.len(), key);
        self.socket.send(vec![key.to_wire(), self.source.clone(), payload]).await?;
        self.published += 1;
        Ok(())
    }

    /// Messages published so far
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Release the socket without lingering
    pub async fn close(mut self) -> Result<()> {
        self.socket.close(Duration::ZERO).await?;
        info!("PUSH publisher closed after {} messages", self.published);
        Ok(())
    }
}
