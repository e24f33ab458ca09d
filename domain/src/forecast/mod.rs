//! Monthly sales forecasting.
//!
//! A forecast request moves through these stages:
//!
//! 1. [`ForecastPlan::new`] validates the horizon and iteration budget.
//! 2. [`load_history`] fetches monthly totals and rejects histories shorter than
//!    [`MIN_TRAINING_POINTS`].
//! 3. [`spawn`] trains a model on the blocking pool, reporting `progress` and `validation` events
//!    into an [`EventSink`] and finishing with exactly one `complete` or `error` event.

use crate::error::{DomainErrorKind, Error, ForecastErrorKind, InternalErrorKind};
use control::TrainingControl;
use entity_api::sale::{self as sale_api, MonthlyTotal};
use entity_api::QueryFilterMap;
use events::{EventSink, ForecastEvent, ModelInfo, PredictedPeriod};
use gru::{GruTimeStep, SequenceModel, TrainingError, TrainingOptions, TrainingStatus};
use log::*;
use normalize::NormalizedSeries;
use period::YearMonth;
use sea_orm::DatabaseConnection;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod control;
pub mod gru;
pub mod metrics;
pub mod normalize;
pub mod period;

/// Number of months of context the model is expected to learn from.
pub const WINDOW_SIZE: usize = 12;
/// Fewest monthly totals a forecast can be trained on.
pub const MIN_TRAINING_POINTS: usize = WINDOW_SIZE + 1;
/// Training stops early once the error drops below this value.
pub const ERROR_THRESHOLD: f64 = 0.005;
/// Iterations between `progress` events.
pub const PROGRESS_PERIOD: u32 = 10_000;
/// Longest forecast horizon in months.
pub const MAX_HORIZON: i64 = 12;
pub const DEFAULT_HORIZON: i64 = 1;
pub const LEARNING_RATE: f64 = 0.01;

const MODEL_SEED: u64 = 42;

/// Validated parameters of one forecast request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPlan {
    pub months_ahead: usize,
    pub iterations: u32,
    pub hidden_size: usize,
}

impl ForecastPlan {
    /// Applies defaults and range checks to the raw request values.
    pub fn new(
        months_ahead: Option<i64>,
        iterations: Option<i64>,
        default_iterations: u32,
        max_iterations: u32,
        hidden_size: usize,
    ) -> Result<Self, Error> {
        let months_ahead = months_ahead.unwrap_or(DEFAULT_HORIZON);
        if !(1..=MAX_HORIZON).contains(&months_ahead) {
            return Err(Error::validation(format!(
                "months_ahead must be between 1 and {MAX_HORIZON}"
            )));
        }

        let iterations = iterations.unwrap_or(i64::from(default_iterations));
        if !(1..=i64::from(max_iterations)).contains(&iterations) {
            return Err(Error::validation(format!(
                "iterations must be between 1 and {max_iterations}"
            )));
        }

        Ok(Self {
            months_ahead: months_ahead as usize,
            iterations: iterations as u32,
            hidden_size,
        })
    }

    fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            iterations: self.iterations,
            error_threshold: ERROR_THRESHOLD,
            callback_period: PROGRESS_PERIOD,
            learning_rate: LEARNING_RATE,
        }
    }
}

/// Monthly sales totals in chronological order, one entry per month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyHistory {
    periods: Vec<YearMonth>,
    totals: Vec<f64>,
}

impl MonthlyHistory {
    /// Sorts the totals chronologically and merges any repeated month.
    pub fn from_totals(rows: Vec<MonthlyTotal>) -> Result<Self, Error> {
        let mut by_period: BTreeMap<YearMonth, f64> = BTreeMap::new();
        for row in rows {
            let period = u32::try_from(row.month)
                .ok()
                .and_then(|month| YearMonth::new(row.year, month))
                .ok_or_else(|| Error {
                    source: None,
                    error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(format!(
                        "Invalid month {} in monthly totals",
                        row.month
                    ))),
                })?;
            *by_period.entry(period).or_insert(0.0) += row.total_sales;
        }

        let (periods, totals) = by_period.into_iter().unzip();
        Ok(Self { periods, totals })
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    pub fn last_period(&self) -> Option<YearMonth> {
        self.periods.last().copied()
    }
}

/// Loads every monthly total and checks that there are enough to train on.
pub async fn load_history(db: &DatabaseConnection) -> Result<MonthlyHistory, Error> {
    let rows = sale_api::monthly_totals(db, QueryFilterMap::new()).await?;
    let history = MonthlyHistory::from_totals(rows)?;

    if history.len() < MIN_TRAINING_POINTS {
        return Err(Error::forecast(ForecastErrorKind::InsufficientData {
            required: MIN_TRAINING_POINTS,
            available: history.len(),
        }));
    }

    Ok(history)
}

/// The result of a successful forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub predictions: Vec<PredictedPeriod>,
    pub model: ModelInfo,
}

impl From<Forecast> for ForecastEvent {
    fn from(forecast: Forecast) -> Self {
        ForecastEvent::Complete {
            predictions: forecast.predictions,
            model: forecast.model,
        }
    }
}

/// Trains a model on the history, validates it against a holdout, and forecasts
/// `plan.months_ahead` months. Emits `progress` and `validation` events but no terminal event.
pub fn run<M, F>(
    history: &MonthlyHistory,
    plan: &ForecastPlan,
    mut new_model: F,
    control: &TrainingControl,
    sink: &dyn EventSink,
) -> Result<Forecast, Error>
where
    M: SequenceModel,
    F: FnMut() -> M,
{
    let last_period = history.last_period().ok_or_else(|| {
        Error::forecast(ForecastErrorKind::InsufficientData {
            required: MIN_TRAINING_POINTS,
            available: 0,
        })
    })?;
    let series = NormalizedSeries::new(history.totals());
    let options = plan.training_options();

    debug!(
        "Training on {} months (min {:.2}, max {:.2}) for up to {} iterations",
        series.len(),
        series.min,
        series.max,
        plan.iterations
    );

    let mut model = new_model();
    let total = plan.iterations;
    let summary = model.train(
        &series.values,
        &options,
        control,
        &mut |status: TrainingStatus| sink.emit(progress_event(status, total)),
    )?;

    info!(
        "Training finished after {} iterations with error {:.6}",
        summary.iterations_run, summary.error
    );

    if sink.is_closed() {
        info!("Event stream closed after training, stopping before holdout validation");
        return Err(TrainingError::Cancelled.into());
    }

    let holdout = validate_holdout(&series.values, plan, &options, &mut new_model, control)?;
    if let Some(event) = holdout {
        sink.emit(event);
    }

    let predictions = model
        .forecast(&series.values, plan.months_ahead)?
        .into_iter()
        .zip(last_period.following(plan.months_ahead))
        .map(|(value, period)| PredictedPeriod {
            year: period.year,
            month: period.month,
            predicted_sales: series.denormalize(value),
        })
        .collect();

    Ok(Forecast {
        predictions,
        model: ModelInfo {
            kind: model.kind().to_string(),
            training_points: series.len(),
            iterations: plan.iterations,
            iterations_run: summary.iterations_run,
            final_error: summary.error,
        },
    })
}

/// Like [`run`], but always finishes the stream with exactly one terminal event.
pub fn execute<M, F>(
    history: &MonthlyHistory,
    plan: &ForecastPlan,
    new_model: F,
    control: &TrainingControl,
    sink: &dyn EventSink,
) where
    M: SequenceModel,
    F: FnMut() -> M,
{
    let event = match run(history, plan, new_model, control, sink) {
        Ok(forecast) => forecast.into(),
        Err(err) => {
            warn!("Forecast failed: {err:?}");
            ForecastEvent::error(err.client_message())
        }
    };
    sink.emit(event);
}

/// Runs [`execute`] with the GRU model on Tokio's blocking pool.
pub async fn spawn(
    history: MonthlyHistory,
    plan: ForecastPlan,
    control: TrainingControl,
    sink: Arc<dyn EventSink>,
) -> Result<(), Error> {
    tokio::task::spawn_blocking(move || {
        execute(
            &history,
            &plan,
            || GruTimeStep::new(plan.hidden_size, MODEL_SEED),
            &control,
            sink.as_ref(),
        )
    })
    .await?;
    Ok(())
}

/// Trains a fresh model without the last `months_ahead` points and scores its forecast of them.
/// A one-point prefix has nothing to fit, so the fresh model forecasts from its initial weights.
/// Returns `None` when the series is no longer than the horizon.
fn validate_holdout<M, F>(
    series: &[f64],
    plan: &ForecastPlan,
    options: &TrainingOptions,
    new_model: &mut F,
    control: &TrainingControl,
) -> Result<Option<ForecastEvent>, Error>
where
    M: SequenceModel,
    F: FnMut() -> M,
{
    let horizon = plan.months_ahead;
    if series.len() <= horizon {
        debug!(
            "Skipping holdout validation: {} points for horizon {horizon}",
            series.len()
        );
        return Ok(None);
    }

    let (prefix, holdout) = series.split_at(series.len() - horizon);
    let mut model = new_model();
    if prefix.len() > 1 {
        model.train(prefix, options, control, &mut |_| {})?;
    } else {
        control.check()?;
        debug!("Holdout prefix has a single point, forecasting without training");
    }
    let predicted = model.forecast(prefix, horizon)?;

    let mse = metrics::mse(holdout, &predicted);
    let mape = metrics::mape(holdout, &predicted);
    debug!("Holdout of {horizon} months: mse {mse:.6}, mape {mape:?}");

    Ok(Some(ForecastEvent::Validation {
        mse: metrics::format_mse(mse),
        mape: metrics::format_mape(mape),
        holdout_points: horizon,
    }))
}

fn progress_event(status: TrainingStatus, total: u32) -> ForecastEvent {
    let percent = if total == 0 {
        100.0
    } else {
        (f64::from(status.iteration) / f64::from(total) * 10_000.0).round() / 100.0
    };
    ForecastEvent::Progress {
        iteration: status.iteration,
        total,
        percent,
        error: status.error,
    }
}


#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod mock_tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn monthly_row(year: i32, month: i32, total_sales: f64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("year", Value::Int(Some(year))),
            ("month", Value::Int(Some(month))),
            ("total_sales", Value::Double(Some(total_sales))),
        ])
    }

    #[tokio::test]
    async fn load_history_rejects_short_histories() {
        let rows: Vec<_> = (1..=5).map(|m| monthly_row(2024, m, 100.0)).collect();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows])
            .into_connection();

        let err = load_history(&db).await.unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Forecast(ForecastErrorKind::InsufficientData {
                required: 13,
                available: 5
            })
        );
    }

    #[tokio::test]
    async fn load_history_accepts_thirteen_months() {
        let mut rows = vec![monthly_row(2022, 12, 90.0)];
        rows.extend((1..=12).map(|m| monthly_row(2023, m, 100.0)));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows])
            .into_connection();

        let history = load_history(&db).await.unwrap();

        assert_eq!(history.len(), 13);
        assert_eq!(history.last_period(), YearMonth::new(2023, 12));
    }
}
