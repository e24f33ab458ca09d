use axum::http::{header, HeaderValue, Method};
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
mod extractors;
mod params;
pub mod router;

pub use error::{Error, Result};

// Web-level state: the service infrastructure plus the forecast stream manager.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    service_state: service::AppState,
    pub sse_manager: Arc<sse::Manager>,
}

impl AppState {
    pub fn new(service_state: service::AppState) -> Self {
        let sse_manager = Arc::new(sse::Manager::new(
            service_state.config.forecast_max_concurrent,
        ));

        Self {
            service_state,
            sse_manager,
        }
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.db_conn_ref()
    }

    pub fn config(&self) -> &Config {
        &self.service_state.config
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let config = app_state.config();
    let interface = config.interface.as_deref().unwrap_or("127.0.0.1");
    let host = format!("{interface}:{}", config.port);
    let cors = cors_layer(&config.allowed_origins);

    info!("Server starting... listening for connections on http://{host}");

    let listener = TcpListener::bind(&host).await?;
    let sse_manager = app_state.sse_manager.clone();
    let router = router::define_routes(app_state).layer(cors);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutdown signal received");
            sse_manager.cancel_all();
        })
        .await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}
