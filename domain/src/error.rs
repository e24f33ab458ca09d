//! Error types for the `domain` layer.
use crate::forecast::gru::TrainingError;
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. The intent is to translate errors between layers while maintaining
/// layer boundaries. Ex. `domain` is dependent on `entity_api`, and `web` is dependent on `domain`.
/// but `web` should not be dependent, directly, on `entity_api`. Ultimately the various
/// `error_kind`s are used by `web` to return appropriate HTTP status codes and messages to the client.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    Forecast(ForecastErrorKind),
    /// A request parameter was rejected before any work began.
    Validation(String),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    Other(String),
}

/// Enum representing the various kinds of entity errors that can bubble up from the "Entity" layer (`entity_api` and `entity`).
/// These errors are translated from the `entity_api` layer to the `domain` layer and reduced to a subset of error kinds
/// that are relevant to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    DbTransaction,
}

/// Failures specific to producing a forecast.
#[derive(Debug, PartialEq)]
pub enum ForecastErrorKind {
    /// Fewer monthly totals exist than the model needs.
    InsufficientData { required: usize, available: usize },
    /// Every forecast slot is busy.
    CapacityExhausted,
    /// The client went away while the model was training.
    Cancelled,
    /// Training ran past its wall-clock budget.
    DeadlineExceeded,
    /// Training or forecasting failed for any other reason.
    Training(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Validation(message.into()),
        }
    }

    pub fn forecast(kind: ForecastErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Forecast(kind),
        }
    }

    /// Text safe to show to a client.
    pub fn client_message(&self) -> String {
        match &self.error_kind {
            DomainErrorKind::Validation(message) => message.clone(),
            DomainErrorKind::Forecast(kind) => match kind {
                ForecastErrorKind::InsufficientData {
                    required,
                    available,
                } => format!(
                    "Not enough data to train the forecast model: at least {required} months of sales are required, found {available}"
                ),
                ForecastErrorKind::CapacityExhausted => {
                    "Too many forecasts are running, try again later".to_string()
                }
                ForecastErrorKind::Cancelled => "Forecast was cancelled".to_string(),
                ForecastErrorKind::DeadlineExceeded => {
                    "Training exceeded deadline".to_string()
                }
                ForecastErrorKind::Training(message) => message.clone(),
            },
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid)) => {
                "Invalid query parameter".to_string()
            }
            DomainErrorKind::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api`` layer to the `domain`` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::InvalidQueryTerm => EntityErrorKind::Invalid,
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<TrainingError> for Error {
    fn from(err: TrainingError) -> Self {
        let kind = match &err {
            TrainingError::Cancelled => ForecastErrorKind::Cancelled,
            TrainingError::DeadlineExceeded => ForecastErrorKind::DeadlineExceeded,
            other => ForecastErrorKind::Training(other.to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Forecast(kind),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Forecast task failed to complete".to_string(),
            )),
        }
    }
}
