//! Subscription keys for the push channel

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{ChunkcastError, Result};

/// Filter token for the subscribe socket
///
/// On the wire a key is its canonical hyphenated UUID string. The same bytes
/// are the subscription prefix and the first part of every push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(Uuid);

impl SubscriptionKey {
    /// Generate a fresh random key
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Wire form used for subscription and as the first message part
    pub fn to_wire(&self) -> Bytes {
        Bytes::from(self.0.hyphenated().to_string())
    }

    /// Parse a key from its wire form
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ChunkcastError::protocol("subscription key", format!("not UTF-8: {e}"))
        })?;
        text.parse()
    }
}

impl From<Uuid> for SubscriptionKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for SubscriptionKey {
    type Err = ChunkcastError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ChunkcastError::protocol("subscription key", format!("'{s}': {e}")))
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_hyphenated_uuid() {
        let key: SubscriptionKey = "7af76005-d4e2-11e3-9714-3c15c2baa558".parse().unwrap();
        assert_eq!(key.to_wire().as_ref(), b"7af76005-d4e2-11e3-9714-3c15c2baa558");
        assert_eq!(SubscriptionKey::from_wire(&key.to_wire()).unwrap(), key);
    }

    #[test]
    fn garbage_key_is_protocol_error() {
        let err = SubscriptionKey::from_wire(b"not-a-uuid").unwrap_err();
        assert!(matches!(err, ChunkcastError::Protocol { .. }));

        let err = SubscriptionKey::from_wire(&[0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, ChunkcastError::Protocol { .. }));
    }
}
