use crate::connection::{StreamId, StreamRegistry};
use crate::error::Error;
use crate::message::ChannelSink;
use crate::stream::ForecastStream;
use log::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

/// Hands out forecast streams, at most `max_concurrent` at a time.
pub struct Manager {
    registry: Arc<StreamRegistry>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Manager {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            registry: Arc::new(StreamRegistry::new()),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Opens a stream and the sink that feeds it, or fails immediately when every slot is taken.
    pub fn open_stream(&self) -> Result<(ForecastStream, ChannelSink), Error> {
        let permit = self.permits.clone().try_acquire_owned().map_err(|_| {
            warn!(
                "Rejecting forecast stream, all {} slots are busy",
                self.max_concurrent
            );
            Error::CapacityExhausted
        })?;

        let (stream_id, cancelled) = self.registry.register();
        info!("Registered forecast stream {}", stream_id.as_str());

        let (sender, receiver) = mpsc::unbounded_channel();
        let slot = StreamSlot {
            stream_id,
            cancelled,
            registry: self.registry.clone(),
            _permit: permit,
        };

        Ok((ForecastStream::new(slot, receiver), ChannelSink::new(sender)))
    }

    /// Raises the cancellation flag of every open stream.
    pub fn cancel_all(&self) {
        info!("Cancelling {} forecast streams", self.registry.len());
        self.registry.cancel_all();
    }

    pub fn active_streams(&self) -> usize {
        self.registry.len()
    }

    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Holds a stream's capacity permit and registry entry. Dropping it cancels the producer,
/// unregisters the stream and frees the slot.
pub struct StreamSlot {
    stream_id: StreamId,
    cancelled: Arc<AtomicBool>,
    registry: Arc<StreamRegistry>,
    _permit: OwnedSemaphorePermit,
}

impl StreamSlot {
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        info!("Unregistering forecast stream {}", self.stream_id.as_str());
        self.registry.unregister(&self.stream_id);
    }
}
