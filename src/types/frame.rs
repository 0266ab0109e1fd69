//! Addressed frame types for the chunked protocol

use bytes::Bytes;
use std::fmt;

/// Opaque identity token of a connected peer
///
/// Assigned by the transport and used as the routing prefix on every frame
/// sent to that peer. Cloning is cheap (reference counted).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(Bytes);

impl Address {
    /// Create an address from raw identity bytes
    pub fn new(identity: impl Into<Bytes>) -> Self {
        Self(identity.into())
    }

    /// Raw identity bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the underlying bytes
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<&str> for Address {
    fn from(identity: &str) -> Self {
        Self(Bytes::copy_from_slice(identity.as_bytes()))
    }
}

impl From<String> for Address {
    fn from(identity: String) -> Self {
        Self(Bytes::from(identity))
    }
}

impl From<Bytes> for Address {
    fn from(identity: Bytes) -> Self {
        Self(identity)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// One addressed unit of data: exactly two parts on the wire
///
/// On send, `address` names the destination peer. On receive, it names the
/// peer the frame came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Routing prefix
    pub address: Address,

    /// Payload bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(address: Address, payload: impl Into<Bytes>) -> Self {
        Self { address, payload: payload.into() }
    }
}
