//! Server-Sent Events (SSE) transport for forecast streams.
//!
//! Each forecast request gets its own short-lived stream: the server writes `progress` and
//! `validation` events while a model trains, then exactly one terminal `complete` or `error`
//! event, and closes the connection.
//!
//! # Architecture
//!
//! - **Bounded concurrency**: [`Manager`] guards a semaphore so that only a configured number
//!   of forecasts train at once. Opening a stream beyond that fails immediately instead of
//!   queueing.
//! - **Active stream registry**: open streams are tracked in a `DashMap` keyed by
//!   [`connection::StreamId`], each with a cancellation flag.
//! - **Cancellation on disconnect**: the stream owns its registry slot. When the client goes
//!   away axum drops the stream, the slot is released and the cancellation flag is raised so
//!   that training stops at its next iteration.
//! - **Terminal contract**: [`message::TerminalGuard`] drops anything sent after a terminal
//!   event and synthesizes an `error` event when the producer stops without one.
//!
//! # Message Flow
//!
//! 1. Controller calls `Manager::open_stream()` and receives a `ForecastStream` and a
//!    `ChannelSink`
//! 2. The sink (an `events::EventSink`) is handed to the forecast running on the blocking pool
//! 3. Each event travels through an unbounded channel to the stream
//! 4. The stream frames each event as `data: <json>` and ends after the terminal event
//!
//! # Example: Serving a forecast
//!
//! ```rust,ignore
//! let (stream, sink) = app_state.sse_manager.open_stream()?;
//! let control = TrainingControl::new(stream.cancellation_flag(), timeout);
//! tokio::spawn(forecast::spawn(history, plan, control, Arc::new(sink)));
//! Ok(stream.into_response())
//! ```
//!
//! # Modules
//!
//! - `connection`: StreamRegistry and type-safe StreamId
//! - `manager`: capacity-bounded stream allocation
//! - `message`: channel sink, terminal guard and SSE framing
//! - `stream`: the response body streamed to the client

pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod stream;

pub use error::Error;
pub use manager::Manager;
pub use message::ChannelSink;
pub use stream::ForecastStream;
