//! Test utilities shared by the unit tests
//!
//! Helpers here build in-process fixtures: configurations without pacing
//! delays, endpoints that never collide, and a push handler that records
//! what it was given.

#![cfg(test)]

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{PushConfig, StreamConfig};
use crate::error::BoxError;
use crate::types::SubscriptionKey;

static NEXT_ENDPOINT: AtomicU64 = AtomicU64::new(1);

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Endpoint name unique within the test process
pub fn unique_endpoint(name: &str) -> String {
    format!("inproc://{name}-{}", NEXT_ENDPOINT.fetch_add(1, Ordering::Relaxed))
}

/// Producer settings over `0..range_end` in chunks of ten, no pacing
pub fn unpaced_stream_config(range_end: u64) -> StreamConfig {
    StreamConfig { range_end, chunk_interval_ms: 0, ..StreamConfig::default() }
}

/// Push settings without a settling delay
pub fn unsettled_push_config() -> PushConfig {
    PushConfig { settle_delay_ms: 0, ..PushConfig::default() }
}

/// Received push messages, in callback order
pub type Recorded = Arc<Mutex<Vec<(SubscriptionKey, Bytes)>>>;

/// A push handler that records every message it is given
pub fn recording_handler()
-> (Recorded, impl FnMut(SubscriptionKey, Bytes) -> Result<(), BoxError> + Send + 'static) {
    let recorded: Recorded = Arc::default();
    let sink = Arc::clone(&recorded);
    let handler = move |key: SubscriptionKey, payload: Bytes| -> Result<(), BoxError> {
        sink.lock().map_err(|e| e.to_string())?.push((key, payload));
        Ok(())
    };
    (recorded, handler)
}

/// Snapshot of recorded messages
pub fn recorded(recorded: &Recorded) -> Vec<(SubscriptionKey, Bytes)> {
    recorded.lock().map(|guard| guard.clone()).unwrap_or_default()
}
