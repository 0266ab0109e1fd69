//! ZeroMQ transport (requires the `zmq` feature and libzmq)
//!
//! `zmq` sockets are blocking and `!Sync`, so every socket call runs on the
//! blocking pool against a socket shared behind a mutex. Receives poll in
//! short slices. A receive future dropped before completion (for example by
//! a shutdown `select!`) makes its blocking call give up within one slice and
//! release the socket, so later calls, `close`, and context termination all
//! proceed.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::transport::{PublishSocket, RouterSocket, SubscribeSocket};
use crate::types::{Address, Frame};
use crate::{ChunkcastError, Result};

/// Longest a blocking receive waits before checking whether it was abandoned
const RECV_SLICE_MS: i64 = 100;

/// Explicitly owned ZeroMQ context
#[derive(Clone)]
pub struct ZmqContext {
    context: zmq::Context,
}

impl Default for ZmqContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ZmqContext {
    /// Create a new context
    pub fn new() -> Self {
        Self { context: zmq::Context::new() }
    }

    /// Create a router socket
    pub fn router(&self) -> Result<ZmqRouter> {
        Ok(ZmqRouter { socket: BlockingSocket::new(self.context.socket(zmq::ROUTER)?) })
    }

    /// Create a subscribe socket
    pub fn subscriber(&self) -> Result<ZmqSubscriber> {
        Ok(ZmqSubscriber { socket: BlockingSocket::new(self.context.socket(zmq::SUB)?) })
    }

    /// Create a publish socket
    pub fn publisher(&self) -> Result<ZmqPublisher> {
        let socket = self.context.socket(zmq::PUB)?;
        socket.set_linger(0)?;
        socket.set_tcp_keepalive(1)?;
        Ok(ZmqPublisher { socket: BlockingSocket::new(socket) })
    }

    /// Terminate the context
    ///
    /// Blocked receives fail with [`ChunkcastError::Terminated`]. Completes
    /// once every socket of the context has been closed or dropped.
    pub async fn terminate(&self) -> Result<()> {
        info!("Terminating ZeroMQ context");
        let mut context = self.context.clone();
        tokio::task::spawn_blocking(move || context.destroy())
            .await
            .map_err(|e| ChunkcastError::transport_failed_with_source("terminate", Box::new(e)))??;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sets its flag when dropped, telling a blocking receive nobody is waiting
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Shares a socket with the blocking pool
///
/// `None` once the socket is closed, or dropped after its context was
/// terminated.
struct BlockingSocket {
    socket: Arc<Mutex<Option<zmq::Socket>>>,
}

impl BlockingSocket {
    fn new(socket: zmq::Socket) -> Self {
        Self { socket: Arc::new(Mutex::new(Some(socket))) }
    }

    async fn call<R, F>(&self, operation: &'static str, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&zmq::Socket) -> zmq::Result<R> + Send + 'static,
    {
        let shared = Arc::clone(&self.socket);
        let result = tokio::task::spawn_blocking(move || {
            let mut slot = lock(&shared);
            let Some(socket) = slot.as_ref() else {
                return Ok(None);
            };
            let result = f(socket);
            // A terminated context cannot finish until its sockets are gone
            if matches!(result, Err(zmq::Error::ETERM)) {
                *slot = None;
            }
            result.map(Some)
        })
        .await
        .map_err(|e| ChunkcastError::transport_failed_with_source(operation, Box::new(e)))?;

        result?.ok_or_else(|| ChunkcastError::closed(operation))
    }

    async fn recv_multipart(&self) -> Result<Vec<Vec<u8>>> {
        let abandoned = AbandonOnDrop(Arc::new(AtomicBool::new(false)));
        let flag = Arc::clone(&abandoned.0);
        let parts = self
            .call("recv", move |socket| {
                loop {
                    let ready = socket.poll(zmq::POLLIN, RECV_SLICE_MS)? > 0;
                    // Leave a ready message queued for whoever calls next
                    if flag.load(Ordering::Acquire) {
                        return Ok(None);
                    }
                    if ready {
                        return socket.recv_multipart(0).map(Some);
                    }
                }
            })
            .await?;
        drop(abandoned);

        // The flag is only set once this future has been dropped
        parts.ok_or_else(|| ChunkcastError::transport_failed("recv abandoned"))
    }

    async fn close(&self, linger: Duration) -> Result<()> {
        let linger = i32::try_from(linger.as_millis()).unwrap_or(i32::MAX);
        let shared = Arc::clone(&self.socket);
        tokio::task::spawn_blocking(move || {
            if let Some(socket) = lock(&shared).take() {
                socket.set_linger(linger)?;
                trace!(linger, "ZeroMQ socket closed");
            }
            Ok::<_, zmq::Error>(())
        })
        .await
        .map_err(|e| ChunkcastError::transport_failed_with_source("close", Box::new(e)))??;
        Ok(())
    }
}

/// Router socket backed by ZeroMQ
pub struct ZmqRouter {
    socket: BlockingSocket,
}

#[async_trait::async_trait]
impl RouterSocket for ZmqRouter {
    async fn bind(&mut self, endpoint: &str) -> Result<()> {
        let endpoint = endpoint.to_string();
        self.socket
            .call("bind", move |socket| {
                socket.set_identity(endpoint.as_bytes())?;
                socket.bind(&endpoint)
            })
            .await?;
        debug!("ZeroMQ router bound");
        Ok(())
    }

    async fn connect(&mut self, endpoint: &str) -> Result<()> {
        let endpoint = endpoint.to_string();
        self.socket.call("connect", move |socket| socket.connect(&endpoint)).await
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.socket
            .call("send", move |socket| {
                let parts = [frame.address.as_bytes(), &frame.payload[..]];
                socket.send_multipart(parts, 0)
            })
            .await
    }

    async fn recv(&mut self) -> Result<Frame> {
        let mut parts = self.socket.recv_multipart().await?;
        if parts.len() != 2 {
            return Err(ChunkcastError::protocol(
                "router frame",
                format!("expected 2 parts, got {}", parts.len()),
            ));
        }
        let payload = parts.pop().unwrap_or_default();
        let address = parts.pop().unwrap_or_default();
        Ok(Frame::new(Address::new(address), payload))
    }

    async fn close(&mut self, linger: Duration) -> Result<()> {
        self.socket.close(linger).await
    }
}

/// Subscribe socket backed by ZeroMQ
pub struct ZmqSubscriber {
    socket: BlockingSocket,
}

#[async_trait::async_trait]
impl SubscribeSocket for ZmqSubscriber {
    async fn connect(&mut self, endpoint: &str) -> Result<()> {
        let endpoint = endpoint.to_string();
        self.socket.call("connect", move |socket| socket.connect(&endpoint)).await
    }

    async fn subscribe(&mut self, prefix: &[u8]) -> Result<()> {
        let prefix = prefix.to_vec();
        self.socket.call("subscribe", move |socket| socket.set_subscribe(&prefix)).await
    }

    async fn unsubscribe(&mut self, prefix: &[u8]) -> Result<()> {
        let prefix = prefix.to_vec();
        self.socket.call("unsubscribe", move |socket| socket.set_unsubscribe(&prefix)).await
    }

    async fn recv(&mut self) -> Result<Vec<Bytes>> {
        let parts = self.socket.recv_multipart().await?;
        Ok(parts.into_iter().map(Bytes::from).collect())
    }

    async fn close(&mut self, linger: Duration) -> Result<()> {
        self.socket.close(linger).await
    }
}

/// Publish socket backed by ZeroMQ
pub struct ZmqPublisher {
    socket: BlockingSocket,
}

#[async_trait::async_trait]
impl PublishSocket for ZmqPublisher {
    async fn bind(&mut self, endpoint: &str) -> Result<()> {
        let endpoint = endpoint.to_string();
        self.socket.call("bind", move |socket| socket.bind(&endpoint)).await
    }

    async fn send(&mut self, parts: Vec<Bytes>) -> Result<()> {
        self.socket
            .call("send", move |socket| {
                socket.send_multipart(parts.iter().map(|part| &part[..]), 0)
            })
            .await
    }

    async fn close(&mut self, linger: Duration) -> Result<()> {
        self.socket.close(linger).await
    }
}
