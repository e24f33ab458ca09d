use dashmap::DashMap;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Unique identifier for a forecast stream (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(String);

impl StreamId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

/// Bookkeeping for one open stream.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub opened_at: Instant,
    /// Raised when the stream goes away; the producer polls it to stop early.
    pub cancelled: Arc<AtomicBool>,
}

/// Registry of forecast streams that are currently open - O(1) register and unregister
pub struct StreamRegistry {
    streams: DashMap<StreamId, StreamInfo>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
        }
    }

    /// Register a new stream and hand back its id with a fresh cancellation flag
    pub fn register(&self) -> (StreamId, Arc<AtomicBool>) {
        let stream_id = StreamId::new();
        let cancelled = Arc::new(AtomicBool::new(false));

        self.streams.insert(
            stream_id.clone(),
            StreamInfo {
                opened_at: Instant::now(),
                cancelled: cancelled.clone(),
            },
        );

        (stream_id, cancelled)
    }

    /// Unregister a stream, raising its cancellation flag
    pub fn unregister(&self, stream_id: &StreamId) {
        if let Some((_, info)) = self.streams.remove(stream_id) {
            info.cancelled.store(true, Ordering::Release);
            debug!(
                "Stream {} closed after {:?}",
                stream_id.as_str(),
                info.opened_at.elapsed()
            );
        }
    }

    /// Raise the cancellation flag of every open stream
    pub fn cancel_all(&self) {
        for entry in self.streams.iter() {
            entry.value().cancelled.store(true, Ordering::Release);
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
