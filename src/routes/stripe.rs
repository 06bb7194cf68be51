use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;
use crate::tenancy::TenancyError;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Public endpoint. Anything short of a persistence failure is acknowledged
/// so Stripe stops retrying.
pub async fn stripe_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("stripe webhook without signature header");
        return TenancyError::SignatureInvalid.into_response();
    };

    match app_state
        .billing_applier()
        .handle_webhook(&body, signature)
        .await
    {
        Ok(outcome) => Json(json!({ "received": true, "outcome": outcome })).into_response(),
        Err(err) => err.into_response(),
    }
}
