//! Reply payloads of a chunked exchange

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

/// Reserved payload marking the end of an exchange.
pub const SENTINEL: &[u8] = b"done";

/// Default content type announced at the start of an exchange.
pub const DEFAULT_CONTENT_TYPE: &str = "int";

/// One reply frame payload, decoded at the framing boundary
///
/// An exchange is always `Announce`, zero or more `Chunk`s, then `Done`.
/// Chunks are JSON arrays, so an encoded chunk can never equal [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Names the item type of the stream that follows
    Announce(String),

    /// One encoded batch of items
    Chunk(Bytes),

    /// End of stream
    Done,
}

impl Reply {
    /// Encode a batch of items as a chunk reply
    pub fn chunk<T: Serialize>(items: &[T]) -> Result<Self> {
        Ok(Reply::Chunk(Bytes::from(serde_json::to_vec(items)?)))
    }

    /// Decode the first reply of an exchange
    ///
    /// Anything but the sentinel is the content-type announcement.
    pub fn decode_first(payload: Bytes) -> Self {
        if payload.as_ref() == SENTINEL {
            Reply::Done
        } else {
            Reply::Announce(String::from_utf8_lossy(&payload).into_owned())
        }
    }

    /// Decode a reply that follows the announcement
    pub fn decode(payload: Bytes) -> Self {
        if payload.as_ref() == SENTINEL { Reply::Done } else { Reply::Chunk(payload) }
    }

    /// Wire payload for this reply
    pub fn encode(&self) -> Bytes {
        match self {
            Reply::Announce(kind) => Bytes::copy_from_slice(kind.as_bytes()),
            Reply::Chunk(bytes) => bytes.clone(),
            Reply::Done => Bytes::from_static(SENTINEL),
        }
    }
}

/// Decode a chunk payload into its ordered items
pub fn decode_chunk<T: DeserializeOwned>(payload: &[u8]) -> Result<Vec<T>> {
    Ok(serde_json::from_slice(payload)?)
}
