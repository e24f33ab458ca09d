use crate::{controller::health_check_controller, AppState};
use axum::{routing::get, Router};

use crate::controller::{forecast_controller, sale_controller};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Sales Forecast API"
        ),
        paths(
            health_check_controller::health_check,
            sale_controller::index,
            sale_controller::filter,
            sale_controller::chart,
            sale_controller::monthly,
            forecast_controller::predict,
        ),
        components(
            schemas(
                domain::sales::Model,
                domain::sale::ChartPoint,
                domain::sale::MonthlySales,
            )
        ),
        tags(
            (name = "sales_forecast", description = "Sales records, rollups and streamed forecasts")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(sale_routes(app_state.clone()))
        .merge(forecast_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn sale_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sales", get(sale_controller::index))
        .route("/api/sales/filter", get(sale_controller::filter))
        .route("/api/sales/chart", get(sale_controller::chart))
        .route("/api/sales/monthly", get(sale_controller::monthly))
        .with_state(app_state)
}

fn forecast_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sales/predict", get(forecast_controller::predict))
        .with_state(app_state)
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod router_tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::NaiveDate;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
    use serde_json::{json, Value as JsonValue};
    use service::config::Config;
    use service::AppState as ServiceState;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app(db: DatabaseConnection, args: &[&str]) -> (Router, AppState) {
        let mut argv = vec!["sales_forecast_rs"];
        argv.extend_from_slice(args);
        let config = <Config as clap::Parser>::parse_from(argv);
        let app_state = AppState::new(ServiceState::new(config, &Arc::new(db)));
        (define_routes(app_state.clone()), app_state)
    }

    async fn get(router: Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn sale(date: NaiveDate, actualsales: f64) -> domain::sales::Model {
        domain::sales::Model {
            id: domain::Id::new_v4(),
            date,
            actualsales,
            product: Some("widget".to_string()),
            region: Some("north".to_string()),
            created_at: chrono::Utc::now().into(),
        }
    }

    fn monthly_row(year: i32, month: i32, total_sales: f64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("year", Value::Int(Some(year))),
            ("month", Value::Int(Some(month))),
            ("total_sales", Value::Double(Some(total_sales))),
        ])
    }

    fn thirteen_months() -> Vec<BTreeMap<&'static str, Value>> {
        let mut rows = vec![monthly_row(2022, 12, 900.0)];
        rows.extend((1..=12).map(|month| monthly_row(2023, month, 1000.0 + 10.0 * month as f64)));
        rows
    }

    #[tokio::test]
    async fn health_check_responds_healthy() {
        let (router, _) = test_app(empty_db(), &[]);

        let response = get(router, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "healthy");
    }

    #[tokio::test]
    async fn index_returns_every_row_as_a_json_array() {
        let rows = vec![sale(ymd(2024, 1, 1), 10.0), sale(ymd(2024, 1, 2), 20.5)];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows])
            .into_connection();
        let (router, _) = test_app(db, &[]);

        let response = get(router, "/api/sales").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[1]["actualsales"], 20.5);
        assert_eq!(body[0]["date"], "2024-01-01");
    }

    #[tokio::test]
    async fn filter_rejects_malformed_dates() {
        let (router, _) = test_app(empty_db(), &[]);

        let response = get(router, "/api/sales/filter?date=01/05/2024").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn filter_rejects_non_numeric_bounds() {
        let (router, _) = test_app(empty_db(), &[]);

        let response = get(router, "/api/sales/filter?min_actualsales=lots").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn database_failures_are_generic_server_errors() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([sea_orm::DbErr::Custom(
                "password authentication failed".to_string(),
            )])
            .into_connection();
        let (router, _) = test_app(db, &[]);

        let response = get(router, "/api/sales/filter?min_actualsales=10").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn chart_decorates_daily_totals() {
        let rows = vec![BTreeMap::from([
            ("date", Value::from(ymd(2024, 1, 1))),
            ("actualsales", Value::Double(Some(200.0))),
        ])];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows])
            .into_connection();
        let (router, _) = test_app(db, &[]);

        let response = get(
            router,
            "/api/sales/chart?start_date=2024-01-01&end_date=2024-01-31",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["date"], "2024-01-01");
        assert_eq!(body[0]["actualsales"], 200.0);
        let predicted = body[0]["predictedsales"].as_f64().unwrap();
        assert!((150.0..=250.0).contains(&predicted));
    }

    #[tokio::test]
    async fn monthly_returns_named_months() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![monthly_row(2023, 3, 512.25)]])
            .into_connection();
        let (router, _) = test_app(db, &[]);

        let response = get(router, "/api/sales/monthly?year=2023").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{"year": 2023, "month": 3, "month_name": "March", "total_sales": 512.25}])
        );
    }

    #[tokio::test]
    async fn monthly_rejects_out_of_range_years() {
        let (router, _) = test_app(empty_db(), &[]);

        let response = get(router, "/api/sales/monthly?year=0").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn predict_rejects_horizons_outside_one_to_twelve() {
        for months_ahead in ["0", "13", "-2"] {
            // No query results are queued: the request must fail before touching the database.
            let (router, _) = test_app(empty_db(), &[]);

            let uri = format!("/api/sales/predict?months_ahead={months_ahead}");
            let response = get(router, &uri).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(body_json(response).await["error"]
                .as_str()
                .unwrap()
                .contains("months_ahead"));
        }
    }

    #[tokio::test]
    async fn predict_rejects_iterations_above_the_configured_maximum() {
        let (router, _) = test_app(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            &["--forecast-max-iterations", "50"],
        );

        let response = get(router, "/api/sales/predict?iterations=51").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn predict_requires_thirteen_months_of_history() {
        let rows: Vec<_> = (1..=12).map(|month| monthly_row(2023, month, 100.0)).collect();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows])
            .into_connection();
        let (router, app_state) = test_app(db, &[]);

        let response = get(router, "/api/sales/predict?months_ahead=3").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("Not enough data"));
        assert_eq!(app_state.sse_manager.active_streams(), 0);
    }

    #[tokio::test]
    async fn predict_is_unavailable_when_every_slot_is_busy() {
        let (router, app_state) = test_app(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            &["--forecast-max-concurrent", "1"],
        );
        let _busy = app_state.sse_manager.open_stream().unwrap();

        let response = get(router, "/api/sales/predict").await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn predict_streams_events_until_complete() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([thirteen_months()])
            .into_connection();
        let (router, _) = test_app(db, &["--forecast-hidden-size", "3"]);

        let response = get(router, "/api/sales/predict?months_ahead=2&iterations=5").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(response.headers()["cache-control"], "no-cache");

        let body = body_text(response).await;
        let events: Vec<JsonValue> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect();

        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(types.first(), Some(&"progress"));
        assert!(types.contains(&"validation"));
        assert_eq!(types.last(), Some(&"complete"));
        assert_eq!(types.iter().filter(|t| **t == "complete").count(), 1);

        let complete = events.last().unwrap();
        assert_eq!(complete["predictions"][0]["year"], 2024);
        assert_eq!(complete["predictions"][0]["month"], 1);
        assert_eq!(complete["predictions"][1]["month"], 2);
        assert_eq!(complete["model"]["training_points"], 13);
    }

    #[tokio::test]
    async fn openapi_document_lists_the_sales_routes() {
        let (router, _) = test_app(empty_db(), &[]);

        let response = get(router, "/api-docs/openapi.json").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["paths"]["/api/sales/predict"].is_object());
        assert!(body["paths"]["/api/sales/monthly"].is_object());
    }
}
