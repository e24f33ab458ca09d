use chrono::NaiveDate;
use log::*;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    entity::prelude::*, DatabaseConnection, FromQueryResult, QueryOrder, QuerySelect, Value,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::error::Error;
use super::query::{apply_filters, Comparison, QueryFilterMap};
use entity::sales::{Column, Entity, Model};

const YEAR_EXPR: &str = r#"CAST(EXTRACT(YEAR FROM "sales"."date") AS INTEGER)"#;
const MONTH_EXPR: &str = r#"CAST(EXTRACT(MONTH FROM "sales"."date") AS INTEGER)"#;

/// Sales summed per calendar date.
#[derive(Clone, Debug, PartialEq, FromQueryResult, Serialize, ToSchema)]
pub struct DailyTotal {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub actualsales: f64,
}

/// Sales summed per (year, month).
#[derive(Clone, Debug, PartialEq, FromQueryResult, Serialize, ToSchema)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: i32,
    pub total_sales: f64,
}

/// Every sales row, oldest first.
pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find().order_by_asc(Column::Date).all(db).await?)
}

/// Sales rows matching every comparison in `query_filter_map`, oldest first.
pub async fn find_by(
    db: &DatabaseConnection,
    query_filter_map: QueryFilterMap,
) -> Result<Vec<Model>, Error> {
    debug!("Finding sales by filters: {query_filter_map:?}");

    let query = apply_filters::<Entity, Column>(Entity::find(), &query_filter_map);

    Ok(query.order_by_asc(Column::Date).all(db).await?)
}

/// `SUM(actualsales)` grouped by date, in ascending date order.
pub async fn daily_totals(
    db: &DatabaseConnection,
    query_filter_map: QueryFilterMap,
) -> Result<Vec<DailyTotal>, Error> {
    debug!("Aggregating daily sales totals by filters: {query_filter_map:?}");

    let totals = apply_filters::<Entity, Column>(Entity::find(), &query_filter_map)
        .select_only()
        .column(Column::Date)
        .column_as(Expr::col(Column::Actualsales).sum(), "actualsales")
        .group_by(Column::Date)
        .order_by_asc(Column::Date)
        .into_model::<DailyTotal>()
        .all(db)
        .await?;

    Ok(totals)
}

/// `SUM(actualsales)` grouped by calendar year and month, in ascending chronological order.
/// Each (year, month) appears at most once.
pub async fn monthly_totals(
    db: &DatabaseConnection,
    query_filter_map: QueryFilterMap,
) -> Result<Vec<MonthlyTotal>, Error> {
    debug!("Aggregating monthly sales totals by filters: {query_filter_map:?}");

    let totals = apply_filters::<Entity, Column>(Entity::find(), &query_filter_map)
        .select_only()
        .column_as(year_expr(), "year")
        .column_as(month_expr(), "month")
        .column_as(Expr::col(Column::Actualsales).sum(), "total_sales")
        .group_by(year_expr())
        .group_by(month_expr())
        .order_by_asc(year_expr())
        .order_by_asc(month_expr())
        .into_model::<MonthlyTotal>()
        .all(db)
        .await?;

    Ok(totals)
}

/// Adds an inclusive `[start, end]` bound on the `date` column. Either side may be open.
pub fn insert_date_range(
    query_filter_map: &mut QueryFilterMap,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) {
    query_filter_map.insert_with(
        "date".to_string(),
        Comparison::Gte,
        start.map(Value::from),
    );
    query_filter_map.insert_with(
        "date".to_string(),
        Comparison::Lte,
        end.map(Value::from),
    );
}

/// First and last calendar day of `year`, or `None` when chrono cannot represent the year.
pub fn year_date_range(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

fn year_expr() -> SimpleExpr {
    Expr::cust(YEAR_EXPR)
}

fn month_expr() -> SimpleExpr {
    Expr::cust(MONTH_EXPR)
}
