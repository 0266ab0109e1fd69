//! Core wire types shared by the chunked and push protocols.
//!
//! - [`Address`] and [`Frame`] describe one addressed two-part unit of the
//!   chunked protocol
//! - [`Reply`] is the tagged form of a reply payload: announcement, chunk, or
//!   the end-of-stream sentinel
//! - [`SubscriptionKey`] is the UUID filter token of the push channel
//!
//! ```rust
//! use chunkcast::types::{Reply, SENTINEL};
//! use bytes::Bytes;
//!
//! let chunk = Reply::chunk(&[1u64, 2, 3]).unwrap();
//! assert_ne!(chunk.encode().as_ref(), SENTINEL);
//! assert_eq!(Reply::decode(Bytes::from_static(b"done")), Reply::Done);
//! ```

mod frame;
mod key;
mod reply;

pub use frame::{Address, Frame};
pub use key::SubscriptionKey;
pub use reply::{DEFAULT_CONTENT_TYPE, Reply, SENTINEL, decode_chunk};
