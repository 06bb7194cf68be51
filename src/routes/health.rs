use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::responses::JsonResponse;
use crate::state::AppState;

pub async fn health_check(State(app_state): State<AppState>) -> Response {
    match app_state.health.ping().await {
        Ok(()) => JsonResponse::success("ok").into_response(),
        Err(err) => {
            error!(?err, "database health probe failed");
            JsonResponse::service_unavailable("Database unavailable").into_response()
        }
    }
}
