use crate::connection::StreamId;
use crate::manager::StreamSlot;
use crate::message::{to_sse_event, TerminalGuard};
use async_stream::stream;
use axum::http::{header, HeaderValue};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use events::ForecastEvent;
use futures::{Stream, StreamExt};
use log::*;
use std::convert::Infallible;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// The receiving half of a forecast stream.
///
/// The stream ends after the first terminal event. Dropping it before then (for example when
/// the client disconnects) raises the producer's cancellation flag.
pub struct ForecastStream {
    slot: StreamSlot,
    receiver: UnboundedReceiver<ForecastEvent>,
}

impl ForecastStream {
    pub(crate) fn new(slot: StreamSlot, receiver: UnboundedReceiver<ForecastEvent>) -> Self {
        Self { slot, receiver }
    }

    pub fn stream_id(&self) -> &StreamId {
        self.slot.stream_id()
    }

    /// Flag the producer polls to learn that nobody is listening anymore.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.slot.cancellation_flag()
    }

    /// Events in the order they were produced, closed by exactly one terminal event.
    pub fn events(self) -> impl Stream<Item = ForecastEvent> {
        let ForecastStream { slot, mut receiver } = self;

        stream! {
            // Owned by the stream so that dropping the stream releases the slot.
            let _slot = slot;
            let mut guard = TerminalGuard::new();

            while let Some(event) = receiver.recv().await {
                if let Some(event) = guard.admit(event) {
                    yield event;
                }
                if guard.is_finished() {
                    break;
                }
            }

            if let Some(event) = guard.finish() {
                yield event;
            }
            debug!("Forecast stream finished");
        }
    }
}

/// `text/event-stream` response carrying one `data: <json>` frame per event.
impl IntoResponse for ForecastStream {
    fn into_response(self) -> Response {
        let events = self
            .events()
            .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

        let mut response = Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response();

        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        response
    }
}
