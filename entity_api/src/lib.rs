use chrono::{Datelike, Months, NaiveDate, Utc};
use log::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait};

pub use entity::{sales, Id};

pub mod error;
pub mod query;
pub mod sale;

pub use query::{IntoQueryFilterMap, QueryFilterMap};

const SEED_PRODUCTS: [(&str, f64); 2] = [("widget", 120.0), ("gadget", 80.0)];
const SEED_REGIONS: [&str; 3] = ["north", "south", "west"];
const SEED_INSERT_BATCH: usize = 500;

/// Populates the sales table with `months` whole months of synthetic daily sales ending with the
/// month that contains `through`. Values follow a gentle upward trend with yearly seasonality and
/// deterministic noise so that repeated seeding produces identical data.
///
/// Returns the number of inserted rows.
pub async fn seed_database(
    db: &DatabaseConnection,
    months: u32,
    through: NaiveDate,
) -> Result<usize, error::Error> {
    let first_of_month = through
        .with_day(1)
        .ok_or_else(error::Error::invalid_query_term)?;
    let start = first_of_month
        .checked_sub_months(Months::new(months.saturating_sub(1)))
        .ok_or_else(error::Error::invalid_query_term)?;
    let end = first_of_month
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(error::Error::invalid_query_term)?;

    info!("Seeding sales from {start} through {end}");

    let mut rng = StdRng::seed_from_u64(42);
    let now = Utc::now();
    let mut rows = Vec::new();

    let days = start.iter_days().take_while(|date| *date <= end);
    for (day_index, date) in days.enumerate() {
        let trend = 1.0 + 0.0005 * day_index as f64;
        let phase = 2.0 * std::f64::consts::PI * date.ordinal0() as f64 / 365.0;
        let season = 1.0 + 0.25 * phase.sin();

        for (product, base) in SEED_PRODUCTS {
            let noise: f64 = rng.gen_range(0.85..1.15);
            let region = SEED_REGIONS[rng.gen_range(0..SEED_REGIONS.len())];

            rows.push(sales::ActiveModel {
                id: Set(Id::new_v4()),
                date: Set(date),
                actualsales: Set((base * trend * season * noise * 100.0).round() / 100.0),
                product: Set(Some(product.to_owned())),
                region: Set(Some(region.to_owned())),
                created_at: Set(now.into()),
            });
        }
    }

    let total = rows.len();
    for batch in rows.chunks(SEED_INSERT_BATCH) {
        sales::Entity::insert_many(batch.to_vec())
            .exec_without_returning(db)
            .await?;
    }

    info!("Inserted {total} sales rows");

    Ok(total)
}
