//! Validating JSON extractor.

use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::problem::ApiError;
use super::state::AppState;
use crate::validation::{InputShape, ValidationResult};

/// A JSON body that passed the validator registered for its shape.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T> FromRequest<Arc<AppState>> for ValidatedJson<T>
where
    T: DeserializeOwned + InputShape + Send,
{
    type Rejection = ApiError;

    async fn from_request(
        request: Request,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;

        match state.validators.validate(&value) {
            ValidationResult::Valid => Ok(ValidatedJson(value)),
            ValidationResult::Invalid(errors) => Err(ApiError::Validation(errors)),
        }
    }
}
