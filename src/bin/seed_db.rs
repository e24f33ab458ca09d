use chrono::Utc;
use log::{error, info};
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};
use std::sync::Arc;

/// Months of daily sales written by a seeding run, ending with the current month.
const SEED_MONTHS: u32 = 24;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Seeding database [{}]...", config.database_url());

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to run migrations: {e}");
        std::process::exit(1);
    }

    let service_state = service::AppState::new(config, &db);

    match entity_api::seed_database(
        service_state.db_conn_ref(),
        SEED_MONTHS,
        Utc::now().date_naive(),
    )
    .await
    {
        Ok(inserted) => info!("Seeded {inserted} sales rows"),
        Err(e) => {
            error!("Failed to seed database: {e}");
            std::process::exit(1);
        }
    }
}
