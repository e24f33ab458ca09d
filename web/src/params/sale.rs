use chrono::NaiveDate;
use domain::error::Error as DomainError;
use domain::sale::{insert_date_range, year_date_range};
use domain::{Comparison, IntoQueryFilterMap, QueryFilterMap};
use sea_orm::Value;
use serde::Deserialize;
use utoipa::IntoParams;

/// Filters for `GET /api/sales/filter`. Every supplied filter must hold.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct FilterParams {
    /// Exact sale date, `YYYY-MM-DD`
    #[param(value_type = Option<String>, format = Date)]
    pub(crate) date: Option<NaiveDate>,
    /// Only rows with `actualsales` at or above this value
    pub(crate) min_actualsales: Option<f64>,
    /// Only rows with `actualsales` at or below this value
    pub(crate) max_actualsales: Option<f64>,
}

impl IntoQueryFilterMap for FilterParams {
    fn into_query_filter_map(self) -> QueryFilterMap {
        let mut query_filter_map = QueryFilterMap::new();
        query_filter_map.insert("date".to_string(), self.date.map(Value::from));
        query_filter_map.insert_with(
            "actualsales".to_string(),
            Comparison::Gte,
            self.min_actualsales.map(Value::from),
        );
        query_filter_map.insert_with(
            "actualsales".to_string(),
            Comparison::Lte,
            self.max_actualsales.map(Value::from),
        );

        query_filter_map
    }
}

/// Inclusive date window for `GET /api/sales/chart`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct ChartParams {
    #[param(value_type = Option<String>, format = Date)]
    pub(crate) start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date)]
    pub(crate) end_date: Option<NaiveDate>,
}

impl IntoQueryFilterMap for ChartParams {
    fn into_query_filter_map(self) -> QueryFilterMap {
        let mut query_filter_map = QueryFilterMap::new();
        insert_date_range(&mut query_filter_map, self.start_date, self.end_date);

        query_filter_map
    }
}

/// Window for `GET /api/sales/monthly`. `year` narrows to one calendar year and combines with
/// the explicit dates.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct MonthlyParams {
    #[param(value_type = Option<String>, format = Date)]
    pub(crate) start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date)]
    pub(crate) end_date: Option<NaiveDate>,
    pub(crate) year: Option<i32>,
}

impl MonthlyParams {
    pub(crate) const MIN_YEAR: i32 = 1;
    pub(crate) const MAX_YEAR: i32 = 9999;

    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        match self.year {
            Some(year) if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) => {
                Err(DomainError::validation(format!(
                    "year must be between {} and {}",
                    Self::MIN_YEAR,
                    Self::MAX_YEAR
                )))
            }
            _ => Ok(self),
        }
    }
}

impl IntoQueryFilterMap for MonthlyParams {
    fn into_query_filter_map(self) -> QueryFilterMap {
        let mut query_filter_map = QueryFilterMap::new();
        insert_date_range(&mut query_filter_map, self.start_date, self.end_date);

        if let Some((start, end)) = self.year.and_then(year_date_range) {
            insert_date_range(&mut query_filter_map, Some(start), Some(end));
        }

        query_filter_map
    }
}

/// Parameters of `GET /api/sales/predict`. Range checks happen in the forecast plan.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct PredictParams {
    /// Months to forecast, 1 to 12 (default 1)
    pub(crate) months_ahead: Option<i64>,
    /// Training iterations (default from configuration)
    pub(crate) iterations: Option<i64>,
}
