//! Error types for entity API
use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

use sea_orm::error::DbErr;

/// Errors while executing operations related to entities.
/// The intent is to categorize errors into two major types:
///  * Errors related to the query itself. Ex an unparsable filter term
///  * Errors related to interactions with the database itself. Ex DbError::Conn
#[derive(Debug, PartialEq)]
pub struct Error {
    // Underlying error emitted from seaORM internals
    pub source: Option<DbErr>,
    // Enum representing which category of error
    pub error_kind: EntityApiErrorKind,
}

#[derive(Debug, PartialEq, Serialize)]
pub enum EntityApiErrorKind {
    // Invalid search term
    InvalidQueryTerm,
    // Record not found
    RecordNotFound,
    // Errors related to interactions with the database itself. Ex DbError::Conn
    SystemError,
}

impl Error {
    pub fn invalid_query_term() -> Self {
        Error {
            source: None,
            error_kind: EntityApiErrorKind::InvalidQueryTerm,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Entity API Error: {:?}", self)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) => Error {
                source: Some(err),
                error_kind: EntityApiErrorKind::RecordNotFound,
            },
            _ => Error {
                source: Some(err),
                error_kind: EntityApiErrorKind::SystemError,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_not_found_keeps_its_kind() {
        let error: Error = DbErr::RecordNotFound("sales".to_string()).into();

        assert_eq!(error.error_kind, EntityApiErrorKind::RecordNotFound);
        assert!(error.source.is_some());
    }

    #[test]
    fn connection_failures_become_system_errors() {
        let error: Error = DbErr::Custom("connection refused".to_string()).into();

        assert_eq!(error.error_kind, EntityApiErrorKind::SystemError);
        assert!(StdError::source(&error).is_some());
    }

    #[test]
    fn invalid_query_term_has_no_source() {
        let error = Error::invalid_query_term();

        assert_eq!(error.error_kind, EntityApiErrorKind::InvalidQueryTerm);
        assert!(error.source.is_none());
    }
}
