//! Chunked request/stream protocol.
//!
//! A consumer sends one request frame to a producer. The producer answers on
//! the same address with:
//!
//! 1. a content-type announcement (`int` by default)
//! 2. zero or more chunks, each a JSON array sent as one frame, paced by a
//!    fixed interval
//! 3. the `done` sentinel, always last
//!
//! The consumer turns those frames back into one ordered, finite sequence of
//! items.
//!
//! ```rust,no_run
//! use chunkcast::chunked::{ChunkConsumer, ChunkProducer};
//! use chunkcast::transports::Context;
//! use chunkcast::StreamConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> chunkcast::Result<()> {
//! let ctx = Context::new();
//! let mut producer =
//!     ChunkProducer::bind(ctx.router(), "inproc://numbers", StreamConfig::default()).await?;
//! tokio::spawn(async move { producer.serve_until_ctrl_c().await });
//!
//! let mut consumer = ChunkConsumer::connect(ctx.router(), "inproc://numbers").await?;
//! let items: Vec<u64> = consumer.fetch("abc").await?.collect_all().await?;
//! assert_eq!(items, (0..50).collect::<Vec<_>>());
//! # Ok(())
//! # }
//! ```

mod consumer;
mod producer;

#[cfg(test)]
mod tests;

pub use consumer::{ChunkConsumer, ChunkStream, StreamState};
pub use producer::{ChunkProducer, RangeChunks, stream_exchange};
