//! Chunked request/stream and keyed push messaging over socket transports.
//!
//! Chunkcast implements two small messaging patterns on top of message-oriented
//! sockets:
//!
//! # Features
//!
//! - **Chunked streaming**: a producer answers one request with a content-type
//!   announcement, paced JSON chunks, and a `done` sentinel; the consumer
//!   yields the items as one ordered, finite sequence
//! - **Keyed push**: a publisher tags every message with a subscription key;
//!   clients receive only the keys they subscribed to
//! - **Background listener**: a tokio task that dispatches push messages to a
//!   handler and stops cooperatively
//! - **Pluggable transports**: an in-process backend, plus ZeroMQ behind the
//!   `zmq` feature
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chunkcast::chunked::{ChunkConsumer, ChunkProducer};
//! use chunkcast::transports::Context;
//! use chunkcast::StreamConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = Context::new();
//!     let mut producer =
//!         ChunkProducer::bind(ctx.router(), "inproc://numbers", StreamConfig::default()).await?;
//!     tokio::spawn(async move { producer.serve_until_ctrl_c().await });
//!
//!     let mut consumer = ChunkConsumer::connect(ctx.router(), "inproc://numbers").await?;
//!     let mut stream = consumer.fetch::<u64>("abc").await?;
//!     while let Some(item) = stream.next_item().await? {
//!         println!("{item}");
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg(test)]
pub mod test_utils;
pub mod types;

// Transport layer
pub mod transport;
pub mod transports;

// Messaging patterns
pub mod chunked;
pub mod push;
pub mod stream;

// Core exports
pub use config::{ChunkcastConfig, PushConfig, StreamConfig};
pub use error::*;
pub use transport::{PublishSocket, RouterSocket, SubscribeSocket};
pub use types::*;

// Pattern exports
pub use chunked::{ChunkConsumer, ChunkProducer, ChunkStream};
pub use push::{ListenerExit, PushClient, PushHandler, PushListener, PushPublisher};
