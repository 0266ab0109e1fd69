//! Keyed push pattern.
//!
//! A [`PushPublisher`] sends `(key, source, payload)` messages; a
//! [`PushClient`] subscribed to some keys receives only those. A
//! [`PushListener`] runs a client on its own task and hands every message to
//! a [`PushHandler`] until it is stopped or the transport shuts down.
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use chunkcast::push::{PushClient, PushListener, PushPublisher};
//! use chunkcast::transports::Context;
//! use chunkcast::{BoxError, PushConfig, SubscriptionKey};
//!
//! # #[tokio::main]
//! # async fn main() -> chunkcast::Result<()> {
//! let ctx = Context::new();
//! let config = PushConfig::default();
//! let mut publisher = PushPublisher::bind(ctx.publisher(), "inproc://push", &config).await?;
//!
//! let key = SubscriptionKey::new_v4();
//! let mut client = PushClient::new(ctx.subscriber(), config);
//! client.connect("inproc://push").await?;
//! client.subscribe(&key).await?;
//!
//! let handler = |key: SubscriptionKey, payload: Bytes| -> Result<(), BoxError> {
//!     println!("{key}: {} bytes", payload.len());
//!     Ok(())
//! };
//! let listener = PushListener::spawn(client, handler);
//! publisher.publish(&key, "hello").await?;
//!
//! listener.stop();
//! ctx.terminate();
//! let report = listener.join().await?;
//! println!("listener exited: {:?}", report.exit);
//! # Ok(())
//! # }
//! ```

mod client;
mod listener;
mod publisher;


pub use client::PushClient;
pub use listener::{ListenerExit, ListenerReport, ListenerState, PushHandler, PushListener};
pub use publisher::PushPublisher;
