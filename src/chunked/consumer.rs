//! Client side of the chunked protocol

use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::transport::RouterSocket;
use crate::types::{Address, Frame, Reply, decode_chunk};
use crate::{ChunkcastError, Result};

/// Router-role client that requests chunk streams from one producer
pub struct ChunkConsumer<S> {
    socket: S,
    server: Address,
    in_flight: bool,
}

impl<S: RouterSocket> ChunkConsumer<S> {
    /// Connect `socket` to the producer bound at `endpoint`
    ///
    /// The producer's identity is its endpoint, so requests are addressed to
    /// `endpoint` itself.
    pub async fn connect(mut socket: S, endpoint: &str) -> Result<Self> {
        socket.connect(endpoint).await?;
        info!(endpoint, "Chunk consumer connected");
        Ok(Self { socket, server: Address::from(endpoint), in_flight: false })
    }

    /// Address requests are sent to
    pub fn server(&self) -> &Address {
        &self.server
    }

    /// Send one request and return the stream of items it produces
    ///
    /// Waits for the content-type announcement before returning. The stream
    /// borrows the consumer, so exchanges never interleave; fetching again
    /// requires a new request. Whatever is left of an earlier exchange that
    /// was dropped before its sentinel is read and discarded first.
    pub async fn fetch<T>(&mut self, identifier: impl Into<Bytes>) -> Result<ChunkStream<'_, S, T>>
    where
        T: DeserializeOwned,
    {
        if self.in_flight {
            self.discard_abandoned().await?;
        }

        let identifier = identifier.into();
        debug!(
            server = %self.server,
            request = %String::from_utf8_lossy(&identifier),
            "Sending chunk request"
        );
        self.socket.send(Frame::new(self.server.clone(), identifier)).await?;
        self.in_flight = true;
        ChunkStream::start(&mut self.socket, &mut self.in_flight).await
    }

    /// Whether an exchange has been requested but its sentinel not yet seen
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    async fn discard_abandoned(&mut self) -> Result<()> {
        let mut discarded = 0usize;
        loop {
            let frame = self.socket.recv().await?;
            if matches!(Reply::decode(frame.payload), Reply::Done) {
                break;
            }
            discarded += 1;
        }
        self.in_flight = false;
        debug!(discarded, "Discarded rest of abandoned exchange");
        Ok(())
    }

    /// Release the socket without lingering
    pub async fn close(mut self) -> Result<()> {
        self.socket.close(Duration::ZERO).await
    }
}

/// Lifecycle of a [`ChunkStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// More frames are expected
    Streaming,

    /// The sentinel was seen or an error occurred; no more items
    Exhausted,
}

/// One-shot, finite sequence of items from a single exchange
///
/// Items come out in chunk arrival order. Once exhausted, by the sentinel or
/// by an error, every further call returns `Ok(None)`.
pub struct ChunkStream<'a, S, T> {
    socket: &'a mut S,
    in_flight: &'a mut bool,
    content_type: Option<String>,
    pending: VecDeque<T>,
    state: StreamState,
    chunks: usize,
}

impl<'a, S, T> ChunkStream<'a, S, T>
where
    S: RouterSocket,
    T: DeserializeOwned,
{
    async fn start(socket: &'a mut S, in_flight: &'a mut bool) -> Result<Self> {
        let first = socket.recv().await?;
        let (content_type, state) = match Reply::decode_first(first.payload) {
            Reply::Announce(kind) => {
                debug!(content_type = %kind, "Chunk stream announced");
                (Some(kind), StreamState::Streaming)
            }
            Reply::Done => {
                debug!("Exchange ended before announcement");
                *in_flight = false;
                (None, StreamState::Exhausted)
            }
            Reply::Chunk(_) => {
                return Err(ChunkcastError::protocol("chunk stream", "chunk before announcement"));
            }
        };

        Ok(Self {
            socket,
            in_flight,
            content_type,
            pending: VecDeque::new(),
            state,
            chunks: 0,
        })
    }

    /// Content type named by the producer, if it announced one
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of chunk frames decoded so far
    pub fn chunks_received(&self) -> usize {
        self.chunks
    }

    /// Next item, `Ok(None)` once the exchange is complete
    ///
    /// Transport and decode errors are returned once and leave the stream
    /// exhausted.
    pub async fn next_item(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }
            if self.state == StreamState::Exhausted {
                return Ok(None);
            }

            match self.receive_chunk().await {
                Ok(Some(items)) => self.pending.extend(items),
                Ok(None) => {
                    debug!(chunks = self.chunks, "Chunk stream complete");
                    self.state = StreamState::Exhausted;
                }
                Err(e) => {
                    self.state = StreamState::Exhausted;
                    return Err(e);
                }
            }
        }
    }

    /// Drain the remaining items
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt into a [`futures::Stream`] of items
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        futures::stream::try_unfold(self, |mut stream| async move {
            let item = stream.next_item().await?;
            Ok::<_, ChunkcastError>(item.map(|item| (item, stream)))
        })
    }

    async fn receive_chunk(&mut self) -> Result<Option<Vec<T>>> {
        let frame = self.socket.recv().await?;
        match Reply::decode(frame.payload) {
            Reply::Done => {
                *self.in_flight = false;
                Ok(None)
            }
            Reply::Chunk(payload) => {
                let items = decode_chunk(&payload)?;
                self.chunks += 1;
                trace!(chunk = self.chunks, items = items.len(), "Chunk decoded");
                Ok(Some(items))
            }
            Reply::Announce(kind) => Err(ChunkcastError::protocol(
                "chunk stream",
                format!("unexpected announcement '{kind}' mid-stream"),
            )),
        }
    }
}
