//! Server side of the chunked protocol

use futures::StreamExt;
use serde::Serialize;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::stream::PaceExt;
use crate::transport::RouterSocket;
use crate::types::{Address, Frame, Reply};
use crate::Result;

/// Finite generator of consecutive integer batches
///
/// `RangeChunks::new(0..50, 10)` yields `[0..10)`, `[10..20)`, ... `[40..50)`.
/// The last batch is shorter when the range does not divide evenly.
#[derive(Debug, Clone)]
pub struct RangeChunks {
    next: u64,
    end: u64,
    size: u64,
}

impl RangeChunks {
    /// Create a generator over `range` in batches of `size` (at least one)
    pub fn new(range: std::ops::Range<u64>, size: u64) -> Self {
        Self { next: range.start, end: range.end, size: size.max(1) }
    }
}

impl Iterator for RangeChunks {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let stop = self.next.saturating_add(self.size).min(self.end);
        let chunk = (self.next..stop).collect();
        self.next = stop;
        Some(chunk)
    }
}

/// Stream one full exchange to `address`
///
/// Sends the content-type announcement, every chunk (pausing `interval` after
/// each), then the sentinel. Returns the number of chunks sent.
pub async fn stream_exchange<S, I, T>(
    socket: &mut S,
    address: &Address,
    content_type: &str,
    chunks: I,
    interval: Duration,
) -> Result<usize>
where
    S: RouterSocket,
    I: IntoIterator<Item = Vec<T>>,
    T: Serialize,
{
    socket
        .send(Frame::new(address.clone(), Reply::Announce(content_type.to_string()).encode()))
        .await?;

    let mut chunks = pin!(chunks.into_iter().paced(interval));
    let mut sent = 0usize;
    while let Some(chunk) = chunks.next().await {
        let payload = Reply::chunk(&chunk)?.encode();
        socket.send(Frame::new(address.clone(), payload)).await?;
        sent += 1;
        debug!(peer = %address, chunk = sent, items = chunk.len(), "Chunk sent");
    }

    socket.send(Frame::new(address.clone(), Reply::Done.encode())).await?;
    debug!(peer = %address, chunks = sent, "Exchange complete");
    Ok(sent)
}

/// Router-role server that answers each request with a paced chunk stream
///
/// Exchanges are handled one at a time: a request that arrives while a
/// stream is in progress waits until that stream's sentinel has been sent.
pub struct ChunkProducer<S> {
    socket: S,
    config: StreamConfig,
    exchanges: u64,
}

impl<S: RouterSocket> ChunkProducer<S> {
    /// Bind `socket` to `endpoint` and prepare to serve
    pub async fn bind(mut socket: S, endpoint: &str, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        socket.bind(endpoint).await?;
        info!(
            endpoint,
            range_end = config.range_end,
            chunk_size = config.chunk_size,
            interval_ms = config.chunk_interval_ms,
            "Chunk producer bound"
        );
        Ok(Self { socket, config, exchanges: 0 })
    }

    /// Number of exchanges completed so far
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Producer settings
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Wait for one request and stream the full reply
    pub async fn serve_one(&mut self) -> Result<()> {
        let request = self.socket.recv().await?;
        self.handle(request).await
    }

    /// Serve requests until `shutdown` resolves or the transport terminates
    ///
    /// Shutdown is only observed between exchanges; a stream in progress runs
    /// to its sentinel first. Returns the total number of exchanges served.
    /// Transport errors other than termination end the loop and are returned.
    pub async fn serve_until<F>(&mut self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()> + Send,
    {
        let mut shutdown = pin!(shutdown);

        loop {
            let request = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, chunk producer stopping");
                    break;
                }
                request = self.socket.recv() => request,
            };

            match request {
                Ok(request) => self.handle(request).await?,
                Err(e) if e.is_termination() => {
                    warn!("Transport terminated, chunk producer stopping");
                    break;
                }
                Err(e) => {
                    error!("Chunk producer receive failed: {}", e);
                    return Err(e);
                }
            }
        }

        info!("Chunk producer stopped after {} exchanges", self.exchanges);
        Ok(self.exchanges)
    }

    /// Serve requests until the process receives Ctrl-C
    pub async fn serve_until_ctrl_c(&mut self) -> Result<u64> {
        self.serve_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Release the socket without lingering
    pub async fn close(mut self) -> Result<()> {
        self.socket.close(Duration::ZERO).await
    }

    async fn handle(&mut self, request: Frame) -> Result<()> {
        info!(
            peer = %request.address,
            request = %String::from_utf8_lossy(&request.payload),
            "Chunk request received"
        );

        let chunks = RangeChunks::new(0..self.config.range_end, self.config.chunk_size);
        stream_exchange(
            &mut self.socket,
            &request.address,
            &self.config.content_type,
            chunks,
            self.config.chunk_interval(),
        )
        .await?;

        self.exchanges += 1;
        Ok(())
    }
}
