use log::{error, info};
use service::{config::Config, logging::Logger};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting sales_forecast_rs v{} in {} mode",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let service_state = service::AppState::new(config, &db);
    let app_state = web::AppState::new(service_state);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}
