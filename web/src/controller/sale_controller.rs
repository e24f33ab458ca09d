use crate::extractors::valid_query::ValidQuery;
use crate::params::sale::{ChartParams, FilterParams, MonthlyParams};
use crate::{AppState, Error};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use domain::sale as SaleApi;

use log::*;

/// GET all sales rows, oldest first
#[utoipa::path(
    get,
    path = "/api/sales",
    responses(
        (status = 200, description = "Successfully retrieved all sales", body = [domain::sales::Model]),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn index(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    debug!("GET all Sales");

    let sales = SaleApi::find_all(app_state.db_conn_ref()).await?;

    debug!("Found {} Sales", sales.len());

    Ok(Json(sales))
}

/// GET sales rows matching every supplied filter
#[utoipa::path(
    get,
    path = "/api/sales/filter",
    params(FilterParams),
    responses(
        (status = 200, description = "Successfully retrieved filtered sales", body = [domain::sales::Model]),
        (status = 400, description = "Malformed filter"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn filter(
    State(app_state): State<AppState>,
    ValidQuery(params): ValidQuery<FilterParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET Sales by filter: {params:?}");

    let sales = SaleApi::find_by(app_state.db_conn_ref(), params).await?;

    debug!("Found {} Sales", sales.len());

    Ok(Json(sales))
}

/// GET daily sales totals for charting.
///
/// `predictedsales` is decoration drawn from 75% to 125% of `actualsales`, not a forecast.
#[utoipa::path(
    get,
    path = "/api/sales/chart",
    params(ChartParams),
    responses(
        (status = 200, description = "Successfully retrieved chart points", body = [domain::sale::ChartPoint]),
        (status = 400, description = "Malformed date"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn chart(
    State(app_state): State<AppState>,
    ValidQuery(params): ValidQuery<ChartParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET Sales chart: {params:?}");

    let points = SaleApi::chart(app_state.db_conn_ref(), params).await?;

    Ok(Json(points))
}

/// GET sales totals per calendar month
#[utoipa::path(
    get,
    path = "/api/sales/monthly",
    params(MonthlyParams),
    responses(
        (status = 200, description = "Successfully retrieved monthly totals", body = [domain::sale::MonthlySales]),
        (status = 400, description = "Malformed date or year"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn monthly(
    State(app_state): State<AppState>,
    ValidQuery(params): ValidQuery<MonthlyParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET monthly Sales: {params:?}");

    let params = params.validate()?;
    let totals = SaleApi::monthly(app_state.db_conn_ref(), params).await?;

    Ok(Json(totals))
}
