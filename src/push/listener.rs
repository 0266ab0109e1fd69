//! Background listener that feeds push messages to a handler

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::client::PushClient;
use crate::error::BoxError;
use crate::transport::SubscribeSocket;
use crate::types::SubscriptionKey;
use crate::{ChunkcastError, Result};

/// Callback invoked by a [`PushListener`] for every received message
///
/// Runs on the listener task, one message at a time; the next receive does
/// not start until it returns. An error ends the listener.
pub trait PushHandler: Send + 'static {
    fn on_message(&mut self, key: SubscriptionKey, payload: Bytes) -> Result<(), BoxError>;
}

impl<F> PushHandler for F
where
    F: FnMut(SubscriptionKey, Bytes) -> Result<(), BoxError> + Send + 'static,
{
    fn on_message(&mut self, key: SubscriptionKey, payload: Bytes) -> Result<(), BoxError> {
        self(key, payload)
    }
}

/// Why a listener loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// [`PushListener::stop`] was observed between messages
    Stopped,

    /// The transport context was terminated
    Terminated,
}

/// Whether the listener task is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Running,
    Stopped,
}

/// Outcome of [`PushListener::join`]
pub struct ListenerReport<S> {
    /// The client, handed back for inspection or [`PushClient::close`]
    pub client: PushClient<S>,

    pub exit: ListenerExit,
}

/// Spawned task that receives push messages and dispatches them to a handler
///
/// Stopping is cooperative: [`stop`](Self::stop) only sets a flag that the
/// task checks between messages. A listener blocked in a receive keeps
/// running until one more message arrives, which is still dispatched, or the
/// transport context is terminated.
pub struct PushListener<S> {
    stop: CancellationToken,
    received: Arc<AtomicU64>,
    dispatched: Arc<AtomicU64>,
    task: JoinHandle<(PushClient<S>, Result<ListenerExit>)>,
}

impl<S: SubscribeSocket> PushListener<S> {
    /// Start listening on `client`, calling `handler` for each message
    pub fn spawn<H: PushHandler>(client: PushClient<S>, handler: H) -> Self {
        let stop = CancellationToken::new();
        let received = client.received_counter();
        let dispatched = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(Self::listen_task(
            client,
            handler,
            stop.clone(),
            Arc::clone(&dispatched),
        ));

        Self { stop, received, dispatched, task }
    }

    /// Ask the listener to exit before its next receive
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            debug!("PUSH listener stop requested");
            self.stop.cancel();
        }
    }

    /// Whether [`stop`](Self::stop) has been called
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// `Stopped` once the task has exited, for whatever reason
    pub fn state(&self) -> ListenerState {
        if self.task.is_finished() { ListenerState::Stopped } else { ListenerState::Running }
    }

    /// Messages received by the client so far
    pub fn received_count(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Messages the handler has returned successfully for
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Wait for the task to exit and take back the client
    ///
    /// Does not stop the listener; call [`stop`](Self::stop) or terminate the
    /// transport context first. Handler failures come back as
    /// [`ChunkcastError::Handler`], fatal transport errors as themselves. In
    /// both cases the client is dropped.
    pub async fn join(self) -> Result<ListenerReport<S>> {
        let (client, outcome) = self.task.await.map_err(|e| {
            error!("PUSH listener task failed: {}", e);
            ChunkcastError::handler(Box::new(e))
        })?;
        Ok(ListenerReport { client, exit: outcome? })
    }

    async fn listen_task<H: PushHandler>(
        mut client: PushClient<S>,
        mut handler: H,
        stop: CancellationToken,
        dispatched: Arc<AtomicU64>,
    ) -> (PushClient<S>, Result<ListenerExit>) {
        info!("PUSH listener started");

        let outcome = loop {
            // Only checked between messages; a pending receive is never interrupted
            if stop.is_cancelled() {
                break Ok(ListenerExit::Stopped);
            }

            match client.receive().await {
                Ok((key, payload)) => {
                    trace!("Dispatching {} bytes for [{}]", payload.len(), key);
                    if let Err(source) = handler.on_message(key, payload) {
                        error!("PUSH handler failed: {}", source);
                        break Err(ChunkcastError::handler(source));
                    }
                    dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.is_termination() => {
                    debug!("Transport terminated during receive");
                    break Ok(ListenerExit::Terminated);
                }
                Err(e) => {
                    error!("PUSH listener receive failed: {}", e);
                    break Err(e);
                }
            }
        };

        info!(
            "PUSH listener ended ({:?}) after {} messages",
            outcome.as_ref().ok(),
            client.received_count()
        );
        (client, outcome)
    }
}
