use crate::Error;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use domain::error::Error as DomainError;
use serde::de::DeserializeOwned;

/// Query string extractor whose rejections are reported as `400 {"error": ...}` like every
/// other validation failure.
pub(crate) struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| DomainError::validation(rejection.body_text()))?;

        Ok(ValidQuery(params))
    }
}
