//! Keyed push client

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PushConfig;
use crate::transport::SubscribeSocket;
use crate::types::SubscriptionKey;
use crate::{ChunkcastError, Result};

/// Subscribe-socket client that returns one `(key, payload)` per receive
///
/// Only messages for subscribed keys are ever returned; filtering happens in
/// the transport. The client is meant for a single caller, usually a
/// [`PushListener`](super::PushListener) task.
pub struct PushClient<S> {
    socket: S,
    config: PushConfig,
    received: Arc<AtomicU64>,
}

impl<S: SubscribeSocket> PushClient<S> {
    /// Wrap a subscribe socket
    pub fn new(socket: S, config: PushConfig) -> Self {
        Self { socket, config, received: Arc::new(AtomicU64::new(0)) }
    }

    /// Connect to a publisher, then wait out the settling delay
    ///
    /// Messages published before the connection is fully up are lost; the
    /// delay gives it time to come up before the first receive.
    pub async fn connect(&mut self, endpoint: &str) -> Result<()> {
        self.socket.connect(endpoint).await?;
        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        info!("PUSH client now connected to [{}].", endpoint);
        Ok(())
    }

    /// Accept messages for `key`
    pub async fn subscribe(&mut self, key: &SubscriptionKey) -> Result<()> {
        self.socket.subscribe(&key.to_wire()).await?;
        info!("PUSH client now accepting data for [{}].", key);
        Ok(())
    }

    /// Stop accepting messages for `key`
    pub async fn unsubscribe(&mut self, key: &SubscriptionKey) -> Result<()> {
        self.socket.unsubscribe(&key.to_wire()).await?;
        info!("PUSH client no longer accepting data for [{}].", key);
        Ok(())
    }

    /// Wait for the next `(key, source, payload)` message
    ///
    /// Returns the key and payload. The received counter is incremented once
    /// for every message returned; malformed messages are errors and are not
    /// counted.
    pub async fn receive(&mut self) -> Result<(SubscriptionKey, Bytes)> {
        let parts = self.socket.recv().await?;
        let [key, source, payload]: [Bytes; 3] = parts.try_into().map_err(|parts: Vec<Bytes>| {
            ChunkcastError::protocol(
                "push message",
                format!("expected 3 parts (key, source, payload), got {}", parts.len()),
            )
        })?;
        let key = SubscriptionKey::from_wire(&key)?;

        let sequence = self.received.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "Received message #{} with key [{}] from [{}].",
            sequence,
            key,
            String::from_utf8_lossy(&source)
        );
        Ok((key, payload))
    }

    /// Messages returned by [`receive`](Self::receive) so far
    pub fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub(crate) fn received_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.received)
    }

    /// Release the socket immediately
    ///
    /// Zero linger: anything queued but not yet received is dropped.
    pub async fn close(mut self) -> Result<()> {
        self.socket.close(Duration::ZERO).await?;
        debug!("PUSH client closed after {} messages", self.received_count());
        Ok(())
    }
}
