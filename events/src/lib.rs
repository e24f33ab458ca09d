//! Forecast event types shared by the forecasting domain and the streaming transport.
//!
//! This crate provides the vocabulary that lets the `domain` crate report training progress
//! without knowing how the events reach a client.
//!
//! # Architecture
//!
//! - **ForecastEvent**: tagged union of everything a forecast stream can carry
//! - **EventSink**: trait the forecast orchestrator writes events into
//!
//! A forecast stream carries any number of `progress` and `validation` events followed by
//! exactly one terminal event, either `complete` or `error`.
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies.

use serde::{Deserialize, Serialize};

/// One forecast point: the calendar month it belongs to and its denormalized sales value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedPeriod {
    pub year: i32,
    pub month: u32,
    pub predicted_sales: f64,
}

/// Description of the model that produced a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model family, e.g. `gru-time-step`
    pub kind: String,
    /// Number of monthly totals the model was trained on
    pub training_points: usize,
    /// Iteration budget requested for training
    pub iterations: u32,
    /// Iterations actually run before the budget or the error threshold was reached
    pub iterations_run: u32,
    /// Training error after the last iteration
    pub final_error: f64,
}

/// Events written to a forecast stream, serialized as `{"type": "<variant>", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForecastEvent {
    /// Periodic training status.
    Progress {
        iteration: u32,
        total: u32,
        /// Share of the iteration budget completed, 0-100
        percent: f64,
        /// Current training error (mean squared error on the normalized series)
        error: f64,
    },
    /// Accuracy of a model trained without the most recent `holdout_points` months.
    Validation {
        /// Mean squared error, four decimals
        mse: String,
        /// Mean absolute percentage error, two decimals with a `%` suffix, or `N/A`
        mape: String,
        holdout_points: usize,
    },
    /// Terminal: the forecast, in chronological order.
    Complete {
        predictions: Vec<PredictedPeriod>,
        model: ModelInfo,
    },
    /// Terminal: the forecast could not be produced.
    Error { message: String },
}

impl ForecastEvent {
    /// The `type` tag this event serializes with.
    pub fn event_type(&self) -> &'static str {
        match self {
            ForecastEvent::Progress { .. } => "progress",
            ForecastEvent::Validation { .. } => "validation",
            ForecastEvent::Complete { .. } => "complete",
            ForecastEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ForecastEvent::Complete { .. } | ForecastEvent::Error { .. }
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        ForecastEvent::Error {
            message: message.into(),
        }
    }
}

/// Destination for forecast events.
///
/// Emitting is synchronous because training runs on a blocking thread. Implementations must not
/// block for long; a sink whose consumer has gone away should drop events and report it through
/// `is_closed` so that producers can stop early.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ForecastEvent);

    /// True once nobody is listening anymore.
    fn is_closed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_serializes_with_type_tag() {
        let event = ForecastEvent::Progress {
            iteration: 10_000,
            total: 25_000,
            percent: 40.0,
            error: 0.0123,
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "progress",
                "iteration": 10000,
                "total": 25000,
                "percent": 40.0,
                "error": 0.0123
            })
        );
    }

    #[test]
    fn complete_serializes_predictions_in_order() {
        let event = ForecastEvent::Complete {
            predictions: vec![
                PredictedPeriod {
                    year: 2024,
                    month: 1,
                    predicted_sales: 1010.5,
                },
                PredictedPeriod {
                    year: 2024,
                    month: 2,
                    predicted_sales: 990.0,
                },
            ],
            model: ModelInfo {
                kind: "gru-time-step".to_string(),
                training_points: 13,
                iterations: 100,
                iterations_run: 42,
                final_error: 0.004,
            },
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["predictions"][0]["month"], 1);
        assert_eq!(value["predictions"][1]["month"], 2);
        assert_eq!(value["model"]["training_points"], 13);
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(ForecastEvent::error("boom").is_terminal());
        assert!(!ForecastEvent::Validation {
            mse: "0.0100".to_string(),
            mape: "5.00%".to_string(),
            holdout_points: 1,
        }
        .is_terminal());
    }

    #[test]
    fn event_type_matches_serialized_tag() {
        let event = ForecastEvent::error("not enough data");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], event.event_type());
        assert_eq!(value["message"], "not enough data");
    }
}
