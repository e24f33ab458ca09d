use crate::error::Error;
use crate::sales::Model;
use chrono::{Month, NaiveDate};
pub use entity_api::sale::{insert_date_range, year_date_range, DailyTotal, MonthlyTotal};
use entity_api::{sale, IntoQueryFilterMap};
use rand::Rng;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

/// Lower bound of the decorative `predictedsales` multiplier.
const CHART_SPREAD_LOW: f64 = 0.75;
/// Upper bound of the decorative `predictedsales` multiplier.
const CHART_SPREAD_HIGH: f64 = 1.25;

/// One point of the sales chart.
///
/// `predictedsales` is decoration for the chart and not a model output: it is drawn uniformly
/// from 75% to 125% of `actualsales`. Use the forecast stream for real predictions.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ChartPoint {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub actualsales: f64,
    pub predictedsales: f64,
}

/// Sales for one calendar month.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct MonthlySales {
    pub year: i32,
    pub month: i32,
    /// English month name, e.g. `January`
    pub month_name: String,
    pub total_sales: f64,
}

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(sale::find_all(db).await?)
}

pub async fn find_by(
    db: &DatabaseConnection,
    params: impl IntoQueryFilterMap,
) -> Result<Vec<Model>, Error> {
    Ok(sale::find_by(db, params.into_query_filter_map()).await?)
}

/// Daily totals paired with a decorative `predictedsales` value.
pub async fn chart(
    db: &DatabaseConnection,
    params: impl IntoQueryFilterMap,
) -> Result<Vec<ChartPoint>, Error> {
    let totals = sale::daily_totals(db, params.into_query_filter_map()).await?;

    Ok(decorate_with(totals, &mut rand::thread_rng()))
}

pub async fn monthly(
    db: &DatabaseConnection,
    params: impl IntoQueryFilterMap,
) -> Result<Vec<MonthlySales>, Error> {
    let totals = sale::monthly_totals(db, params.into_query_filter_map()).await?;

    Ok(totals.into_iter().map(MonthlySales::from).collect())
}

pub fn decorate_with<R: Rng>(totals: Vec<DailyTotal>, rng: &mut R) -> Vec<ChartPoint> {
    totals
        .into_iter()
        .map(|total| {
            let factor = rng.gen_range(CHART_SPREAD_LOW..=CHART_SPREAD_HIGH);
            ChartPoint {
                date: total.date,
                actualsales: total.actualsales,
                predictedsales: (total.actualsales * factor * 100.0).round() / 100.0,
            }
        })
        .collect()
}

impl From<MonthlyTotal> for MonthlySales {
    fn from(total: MonthlyTotal) -> Self {
        let month_name = u8::try_from(total.month)
            .ok()
            .and_then(|month| Month::try_from(month).ok())
            .map(|month| month.name().to_string())
            .unwrap_or_default();

        Self {
            year: total.year,
            month: total.month,
            month_name,
            total_sales: total.total_sales,
        }
    }
}
