use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::tenancy::TenancyError;

/// Field-level checks run after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// `Json<T>` that also runs [`Validate`]. Both malformed bodies and failed
/// checks reject with a typed 400.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                debug!(%rejection, "malformed request body");
                TenancyError::InvalidInput(rejection.body_text()).into_response()
            })?;

        value
            .validate()
            .map_err(|msg| TenancyError::InvalidInput(msg).into_response())?;

        Ok(ValidatedJson(value))
    }
}

/// Like [`ValidatedJson`] but an absent or blank body yields `T::default()`.
/// A non-empty body must still be valid JSON for `T`; the content type is not
/// checked.
#[derive(Debug)]
pub struct OptionalValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for OptionalValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Default,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            debug!(%rejection, "unreadable request body");
            TenancyError::InvalidInput(rejection.body_text()).into_response()
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalValidatedJson(T::default()));
        }

        let value: T = serde_json::from_slice(&bytes).map_err(|err| {
            debug!(%err, "malformed request body");
            TenancyError::InvalidInput(format!("invalid JSON body: {err}")).into_response()
        })?;

        value
            .validate()
            .map_err(|msg| TenancyError::InvalidInput(msg).into_response())?;

        Ok(OptionalValidatedJson(value))
    }
}

pub fn require_non_empty(field: &str, value: &str, max_len: usize) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if trimmed.chars().count() > max_len {
        return Err(format!("{field} must be at most {max_len} characters"));
    }
    Ok(())
}
