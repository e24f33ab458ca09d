use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, ForecastErrorKind, InternalErrorKind,
};

use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
            DomainErrorKind::Forecast(forecast_error_kind) => match forecast_error_kind {
                ForecastErrorKind::InsufficientData { .. } => StatusCode::BAD_REQUEST,
                ForecastErrorKind::CapacityExhausted => StatusCode::SERVICE_UNAVAILABLE,
                ForecastErrorKind::Cancelled
                | ForecastErrorKind::DeadlineExceeded
                | ForecastErrorKind::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => StatusCode::NOT_FOUND,
                    EntityErrorKind::Invalid => StatusCode::BAD_REQUEST,
                    EntityErrorKind::DbTransaction => StatusCode::INTERNAL_SERVER_ERROR,
                },
                InternalErrorKind::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Response for failures that happen before a forecast stream opens: server errors carry a
    /// `message` next to the generic `error`.
    pub fn into_forecast_response(self) -> Response {
        let status = self.status_code();
        if status != StatusCode::INTERNAL_SERVER_ERROR {
            return self.into_response();
        }

        error!("Forecast could not start: {:?}", self.0);
        (
            status,
            Json(json!({
                "error": "Failed to generate forecast",
                "message": self.0.client_message(),
            })),
        )
            .into_response()
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{status}: {:?}", self.0);
        } else {
            warn!("{status}: {:?}", self.0);
        }

        (status, Json(json!({ "error": self.0.client_message() }))).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
