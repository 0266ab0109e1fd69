//! Tunable parameters for the producer and the push client.
//!
//! Both delays are plain configuration with defaults matching the historic
//! behavior: one second between chunks and 100 ms of settling after connect.
//! Configuration can be built in code or loaded from YAML:
//!
//! ```rust
//! use chunkcast::ChunkcastConfig;
//!
//! let config = ChunkcastConfig::from_yaml_str(
//!     "stream:\n  chunk_interval_ms: 0\n  range_end: 20\npush:\n  settle_delay_ms: 5\n",
//! )
//! .unwrap();
//! assert_eq!(config.stream.range_end, 20);
//! assert_eq!(config.stream.chunk_size, 10);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::DEFAULT_CONTENT_TYPE;
use crate::{ChunkcastError, Result};

/// Chunk producer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Content type announced before the first chunk
    pub content_type: String,

    /// Exclusive upper bound of the generated integer range
    pub range_end: u64,

    /// Number of items per chunk
    pub chunk_size: u64,

    /// Pause after each chunk before producing the next
    pub chunk_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            range_end: 50,
            chunk_size: 10,
            chunk_interval_ms: 1_000,
        }
    }
}

impl StreamConfig {
    /// Inter-chunk pause as a duration
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkcastError::config("stream.chunk_size must be greater than zero"));
        }
        if self.content_type.is_empty() {
            return Err(ChunkcastError::config("stream.content_type must not be empty"));
        }
        if self.content_type.as_bytes() == crate::types::SENTINEL {
            return Err(ChunkcastError::config("stream.content_type collides with the sentinel"));
        }
        Ok(())
    }
}

/// Push client and publisher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Pause after connect so the subscription is live before first use
    pub settle_delay_ms: u64,

    /// Source tag a publisher puts in the second message part
    pub source: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { settle_delay_ms: 100, source: "localhost".to_string() }
    }
}

impl PushConfig {
    /// Settling delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkcastConfig {
    pub stream: StreamConfig,
    pub push: PushConfig,
}

impl ChunkcastConfig {
    /// Parse and validate a YAML document. Missing fields take defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.stream.validate()?;
        Ok(config)
    }
}
