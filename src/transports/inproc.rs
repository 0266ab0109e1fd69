//! In-process transport
//!
//! Sockets created from one [`Context`] reach each other by endpoint name
//! through bounded tokio channels. Semantics follow the socket roles this
//! crate needs:
//!
//! - router sockets address peers by identity; a bound router's identity is
//!   its endpoint, a connecting router gets a generated one
//! - a frame addressed to a peer that is gone is dropped, as a ZeroMQ router
//!   drops unroutable messages
//! - publishers fan a message out to every subscriber with a matching prefix;
//!   a subscriber whose queue is at the high-water mark misses the message
//! - [`Context::terminate`] makes every pending and future operation on the
//!   context's sockets fail with [`ChunkcastError::Terminated`]

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::transport::{PublishSocket, RouterSocket, SubscribeSocket};
use crate::types::{Address, Frame};
use crate::{ChunkcastError, Result};

/// Default per-socket queue bound
pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Explicitly owned transport context
///
/// Cloning shares the same context. Sockets keep the context alive.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Shared>,
}

struct Shared {
    terminated: CancellationToken,
    routers: Mutex<HashMap<Bytes, mpsc::Sender<Frame>>>,
    hubs: Mutex<HashMap<String, Arc<Hub>>>,
    next_id: AtomicU64,
    high_water_mark: usize,
}

#[derive(Default)]
struct Hub {
    bound: AtomicBool,
    subscribers: Mutex<Vec<SubscriberEntry>>,
}

struct SubscriberEntry {
    id: u64,
    prefixes: Vec<Bytes>,
    tx: mpsc::Sender<Vec<Bytes>>,
}

impl SubscriberEntry {
    fn accepts(&self, key: &[u8]) -> bool {
        self.prefixes.iter().any(|prefix| key.starts_with(prefix))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context with the default high-water mark
    pub fn new() -> Self {
        Self::with_high_water_mark(DEFAULT_HIGH_WATER_MARK)
    }

    /// Create a context whose socket queues hold at most `high_water_mark` messages
    pub fn with_high_water_mark(high_water_mark: usize) -> Self {
        Self {
            inner: Arc::new(Shared {
                terminated: CancellationToken::new(),
                routers: Mutex::new(HashMap::new()),
                hubs: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                high_water_mark: high_water_mark.max(1),
            }),
        }
    }

    /// Create a router socket with a generated identity
    pub fn router(&self) -> InprocRouter {
        let id = self.next_id();
        let identity = Bytes::from(format!("inproc-peer-{id}"));
        let (tx, inbox) = mpsc::channel(self.inner.high_water_mark);
        lock(&self.inner.routers).insert(identity.clone(), tx.clone());
        InprocRouter { ctx: self.clone(), identity, tx, inbox, closed: false }
    }

    /// Create a subscribe socket
    pub fn subscriber(&self) -> InprocSubscriber {
        let (tx, rx) = mpsc::channel(self.inner.high_water_mark);
        InprocSubscriber {
            ctx: self.clone(),
            id: self.next_id(),
            tx,
            rx,
            prefixes: Vec::new(),
            hubs: Vec::new(),
            closed: false,
        }
    }

    /// Create a publish socket
    pub fn publisher(&self) -> InprocPublisher {
        InprocPublisher { ctx: self.clone(), hub: None, endpoint: String::new(), closed: false }
    }

    /// Terminate the context
    ///
    /// Blocked receives on every socket of this context return
    /// [`ChunkcastError::Terminated`], as do all later operations.
    pub fn terminate(&self) {
        if !self.inner.terminated.is_cancelled() {
            info!("Terminating in-process transport context");
            self.inner.terminated.cancel();
        }
    }

    /// Whether [`Context::terminate`] has been called
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.is_cancelled()
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn hub(&self, endpoint: &str) -> Arc<Hub> {
        Arc::clone(lock(&self.inner.hubs).entry(endpoint.to_string()).or_default())
    }

    fn check_live(&self) -> Result<()> {
        if self.is_terminated() { Err(ChunkcastError::Terminated) } else { Ok(()) }
    }
}

/// Router socket of the in-process transport
pub struct InprocRouter {
    ctx: Context,
    identity: Bytes,
    tx: mpsc::Sender<Frame>,
    inbox: mpsc::Receiver<Frame>,
    closed: bool,
}

impl InprocRouter {
    /// This socket's identity as seen by peers
    pub fn identity(&self) -> Address {
        Address::new(self.identity.clone())
    }

    fn check_open(&self) -> Result<()> {
        self.ctx.check_live()?;
        if self.closed {
            return Err(ChunkcastError::closed(String::from_utf8_lossy(&self.identity)));
        }
        Ok(())
    }

    fn unregister(&self) {
        let mut routers = lock(&self.ctx.inner.routers);
        if routers.get(&self.identity).is_some_and(|tx| tx.same_channel(&self.tx)) {
            routers.remove(&self.identity);
        }
    }
}

#[async_trait::async_trait]
impl RouterSocket for InprocRouter {
    async fn bind(&mut self, endpoint: &str) -> Result<()> {
        self.check_open()?;
        let identity = Bytes::copy_from_slice(endpoint.as_bytes());
        {
            let mut routers = lock(&self.ctx.inner.routers);
            if routers.contains_key(&identity) {
                return Err(ChunkcastError::transport_failed(format!(
                    "bind {endpoint}: address already in use"
                )));
            }
            routers.insert(identity.clone(), self.tx.clone());
        }
        self.unregister();
        self.identity = identity;
        debug!(endpoint, "In-process router bound");
        Ok(())
    }

    async fn connect(&mut self, endpoint: &str) -> Result<()> {
        self.check_open()?;
        if !lock(&self.ctx.inner.routers).contains_key(endpoint.as_bytes()) {
            return Err(ChunkcastError::closed(endpoint));
        }
        debug!(endpoint, identity = %self.identity(), "In-process router connected");
        Ok(())
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.check_open()?;
        let peer = lock(&self.ctx.inner.routers).get(frame.address.as_bytes()).cloned();
        let Some(peer) = peer else {
            trace!(to = %frame.address, "Unroutable frame dropped");
            return Ok(());
        };

        let outgoing = Frame::new(self.identity(), frame.payload);
        trace!(to = %frame.address, bytes = outgoing.payload.len(), "Router send");
        tokio::select! {
            biased;
            _ = self.ctx.inner.terminated.cancelled() => Err(ChunkcastError::Terminated),
            sent = peer.send(outgoing) => {
                if sent.is_err() {
                    trace!(to = %frame.address, "Peer left, frame dropped");
                }
                Ok(())
            }
        }
    }

    async fn recv(&mut self) -> Result<Frame> {
        self.check_open()?;
        tokio::select! {
            biased;
            _ = self.ctx.inner.terminated.cancelled() => Err(ChunkcastError::Terminated),
            frame = self.inbox.recv() => {
                frame.ok_or_else(|| ChunkcastError::closed(String::from_utf8_lossy(&self.identity)))
            }
        }
    }

    async fn close(&mut self, linger: Duration) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.unregister();
        self.inbox.close();
        self.closed = true;
        debug!(identity = %self.identity(), ?linger, "In-process router closed");
        Ok(())
    }
}

impl Drop for InprocRouter {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Subscribe socket of the in-process transport
pub struct InprocSubscriber {
    ctx: Context,
    id: u64,
    tx: mpsc::Sender<Vec<Bytes>>,
    rx: mpsc::Receiver<Vec<Bytes>>,
    prefixes: Vec<Bytes>,
    hubs: Vec<Arc<Hub>>,
    closed: bool,
}

impl InprocSubscriber {
    fn check_open(&self) -> Result<()> {
        self.ctx.check_live()?;
        if self.closed {
            return Err(ChunkcastError::closed(format!("inproc-subscriber-{}", self.id)));
        }
        Ok(())
    }

    fn sync_prefixes(&self) {
        for hub in &self.hubs {
            let mut subscribers = lock(&hub.subscribers);
            if let Some(entry) = subscribers.iter_mut().find(|entry| entry.id == self.id) {
                entry.prefixes = self.prefixes.clone();
            }
        }
    }

    fn detach(&mut self) {
        for hub in self.hubs.drain(..) {
            lock(&hub.subscribers).retain(|entry| entry.id != self.id);
        }
    }
}

#[async_trait::async_trait]
impl SubscribeSocket for InprocSubscriber {
    async fn connect(&mut self, endpoint: &str) -> Result<()> {
        self.check_open()?;
        let hub = self.ctx.hub(endpoint);
        lock(&hub.subscribers).push(SubscriberEntry {
            id: self.id,
            prefixes: self.prefixes.clone(),
            tx: self.tx.clone(),
        });
        self.hubs.push(hub);
        debug!(endpoint, "In-process subscriber connected");
        Ok(())
    }

    async fn subscribe(&mut self, prefix: &[u8]) -> Result<()> {
        self.check_open()?;
        self.prefixes.push(Bytes::copy_from_slice(prefix));
        self.sync_prefixes();
        Ok(())
    }

    async fn unsubscribe(&mut self, prefix: &[u8]) -> Result<()> {
        self.check_open()?;
        if let Some(index) = self.prefixes.iter().position(|p| p.as_ref() == prefix) {
            self.prefixes.remove(index);
            self.sync_prefixes();
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<Bytes>> {
        self.check_open()?;
        tokio::select! {
            biased;
            _ = self.ctx.inner.terminated.cancelled() => Err(ChunkcastError::Terminated),
            parts = self.rx.recv() => {
                parts.ok_or_else(|| ChunkcastError::closed(format!("inproc-subscriber-{}", self.id)))
            }
        }
    }

    async fn close(&mut self, linger: Duration) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.detach();
        self.rx.close();
        self.closed = true;
        debug!(id = self.id, ?linger, "In-process subscriber closed");
        Ok(())
    }
}

impl Drop for InprocSubscriber {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Publish socket of the in-process transport
pub struct InprocPublisher {
    ctx: Context,
    hub: Option<Arc<Hub>>,
    endpoint: String,
    closed: bool,
}

#[async_trait::async_trait]
impl PublishSocket for InprocPublisher {
    async fn bind(&mut self, endpoint: &str) -> Result<()> {
        self.ctx.check_live()?;
        let hub = self.ctx.hub(endpoint);
        if hub.bound.swap(true, Ordering::AcqRel) {
            return Err(ChunkcastError::transport_failed(format!(
                "bind {endpoint}: address already in use"
            )));
        }
        self.hub = Some(hub);
        self.endpoint = endpoint.to_string();
        debug!(endpoint, "In-process publisher bound");
        Ok(())
    }

    async fn send(&mut self, parts: Vec<Bytes>) -> Result<()> {
        self.ctx.check_live()?;
        if self.closed {
            return Err(ChunkcastError::closed(self.endpoint.clone()));
        }
        let Some(hub) = &self.hub else {
            return Err(ChunkcastError::transport_failed("send on unbound publisher"));
        };
        let Some(key) = parts.first().cloned() else {
            return Err(ChunkcastError::protocol("publish", "message has no parts"));
        };

        let mut subscribers = lock(&hub.subscribers);
        subscribers.retain(|entry| !entry.tx.is_closed());
        for entry in subscribers.iter().filter(|entry| entry.accepts(&key)) {
            if entry.tx.try_send(parts.clone()).is_err() {
                trace!(subscriber = entry.id, "Subscriber queue full, message dropped");
            }
        }
        Ok(())
    }

    async fn close(&mut self, linger: Duration) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(hub) = self.hub.take() {
            hub.bound.store(false, Ordering::Release);
        }
        self.closed = true;
        debug!(endpoint = %self.endpoint, ?linger, "In-process publisher closed");
        Ok(())
    }
}
