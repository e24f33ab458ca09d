use axum::response::sse::Event;
use events::{EventSink, ForecastEvent};
use log::*;
use tokio::sync::mpsc::UnboundedSender;

/// Message sent when a producer stops without reporting a result.
pub const MISSING_TERMINAL_MESSAGE: &str = "Forecast ended without a result";

/// `EventSink` that forwards events into a stream's channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<ForecastEvent>,
}

impl ChannelSink {
    pub fn new(sender: UnboundedSender<ForecastEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ForecastEvent) {
        if let Err(e) = self.sender.send(event) {
            debug!(
                "Dropping {} event, stream is closed",
                e.0.event_type()
            );
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Enforces that a stream carries exactly one terminal event.
#[derive(Debug, Default)]
pub struct TerminalGuard {
    finished: bool,
}

impl TerminalGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes `event` through unless a terminal event was already admitted.
    pub fn admit(&mut self, event: ForecastEvent) -> Option<ForecastEvent> {
        if self.finished {
            warn!("Discarding {} event after terminal event", event.event_type());
            return None;
        }
        self.finished = event.is_terminal();
        Some(event)
    }

    /// Called when the producer is done. Returns the error event to send if it never produced
    /// a terminal event.
    pub fn finish(self) -> Option<ForecastEvent> {
        if self.finished {
            None
        } else {
            warn!("Forecast producer ended without a terminal event");
            Some(ForecastEvent::error(MISSING_TERMINAL_MESSAGE))
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Frames `event` as an SSE `data:` line. The event type travels inside the JSON payload.
pub fn to_sse_event(event: &ForecastEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            error!("Failed to serialize SSE event: {e}");
            Event::default().data(r#"{"type":"error","message":"Failed to serialize event"}"#)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn progress(iteration: u32) -> ForecastEvent {
        ForecastEvent::Progress {
            iteration,
            total: 10,
            percent: f64::from(iteration) * 10.0,
            error: 0.1,
        }
    }

    #[test]
    fn guard_drops_events_after_terminal() {
        let mut guard = TerminalGuard::new();

        assert!(guard.admit(progress(1)).is_some());
        assert!(guard.admit(ForecastEvent::error("boom")).is_some());
        assert!(guard.admit(progress(2)).is_none());
        assert!(guard.admit(ForecastEvent::error("again")).is_none());
        assert_eq!(guard.finish(), None);
    }

    #[test]
    fn guard_synthesizes_error_when_producer_stops_early() {
        let mut guard = TerminalGuard::new();
        guard.admit(progress(1));

        assert_eq!(
            guard.finish(),
            Some(ForecastEvent::error(MISSING_TERMINAL_MESSAGE))
        );
    }

    #[test]
    fn channel_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);

        assert!(!sink.is_closed());
        drop(rx);

        assert!(sink.is_closed());
        sink.emit(progress(1));
    }
}
