use crate::extractors::valid_query::ValidQuery;
use crate::params::sale::PredictParams;
use crate::{AppState, Error};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use domain::error::{Error as DomainError, ForecastErrorKind};
use domain::forecast::{self as ForecastApi, control::TrainingControl, ForecastPlan};
use log::*;
use std::sync::Arc;

/// GET a streamed forecast of monthly sales.
///
/// Responds with `text/event-stream`. Each frame is `data: <json>` where the JSON carries a
/// `type` of `progress`, `validation`, `complete` or `error`; the stream closes after
/// `complete` or `error`.
#[utoipa::path(
    get,
    path = "/api/sales/predict",
    params(PredictParams),
    responses(
        (status = 200, description = "Forecast event stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Invalid parameters or not enough data"),
        (status = 500, description = "Forecast could not start"),
        (status = 503, description = "Too many forecasts are running")
    )
)]
pub async fn predict(
    State(app_state): State<AppState>,
    ValidQuery(params): ValidQuery<PredictParams>,
) -> Response {
    debug!("GET Sales forecast: {params:?}");

    match start_forecast(app_state, params).await {
        Ok(response) => response,
        Err(e) => e.into_forecast_response(),
    }
}

async fn start_forecast(app_state: AppState, params: PredictParams) -> Result<Response, Error> {
    let config = app_state.config();
    let plan = ForecastPlan::new(
        params.months_ahead,
        params.iterations,
        config.forecast_default_iterations,
        config.forecast_max_iterations,
        config.forecast_hidden_size,
    )?;

    let (stream, sink) = app_state
        .sse_manager
        .open_stream()
        .map_err(|_| DomainError::forecast(ForecastErrorKind::CapacityExhausted))?;

    let history = ForecastApi::load_history(app_state.db_conn_ref()).await?;

    info!(
        "Starting forecast stream {} for {} months from {} monthly totals",
        stream.stream_id().as_str(),
        plan.months_ahead,
        history.len()
    );

    let control = TrainingControl::new(stream.cancellation_flag(), config.forecast_timeout());
    tokio::spawn(async move {
        if let Err(e) = ForecastApi::spawn(history, plan, control, Arc::new(sink)).await {
            error!("Forecast task failed: {e:?}");
        }
    });

    Ok(stream.into_response())
}
