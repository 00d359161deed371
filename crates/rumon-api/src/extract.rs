use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Field-level checks run after deserialization. Every failure is collected
/// so the client sees all of them at once.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// `Json<T>` that rejects malformed bodies with a 400 envelope and then runs
/// `T::validate`.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        value.validate().map_err(ApiError::Validation)?;
        Ok(ValidJson(value))
    }
}
