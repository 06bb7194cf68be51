use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::subscription::Plan;
use crate::routes::{
    auth::AuthSession,
    input::{OptionalValidatedJson, Validate},
    tenant::load_tenant,
};
use crate::services::generation::{generate_or_stub, GenerationRequest};
use crate::state::AppState;
use crate::tenancy::{Remaining, TenancyError};

pub const DEFAULT_PROMPT: &str =
    "Give a short onboarding message for my SaaS dashboard. Be friendly.";
const MAX_PROMPT_CHARS: usize = 4000;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl GenerateRequest {
    fn prompt_or_default(&self) -> String {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .unwrap_or(DEFAULT_PROMPT)
            .to_string()
    }
}

impl Validate for GenerateRequest {
    fn validate(&self) -> Result<(), String> {
        match &self.prompt {
            Some(prompt) if prompt.chars().count() > MAX_PROMPT_CHARS => Err(format!(
                "prompt must be at most {MAX_PROMPT_CHARS} characters"
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerationMeta {
    pub plan: Plan,
    pub month: String,
    pub used: i64,
    pub remaining: Remaining,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub output: String,
    pub meta: GenerationMeta,
}

pub async fn generate_text(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    OptionalValidatedJson(payload): OptionalValidatedJson<GenerateRequest>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    if let Err(retry_after_secs) = app_state.rate_limiter.check(context.org_id) {
        return TenancyError::RateLimited { retry_after_secs }.into_response();
    }

    let reservation = match app_state
        .usage_ledger()
        .try_consume(context.org_id, context.plan, 1)
        .await
    {
        Ok(reservation) => reservation,
        Err(err) => return err.into_response(),
    };

    // A provider failure still returns the stub and keeps the reservation.
    let request = GenerationRequest::new(payload.prompt_or_default());
    let generated = generate_or_stub(app_state.generator.as_ref(), &request).await;

    info!(
        org_id = %context.org_id,
        used = reservation.allowance.used,
        degraded = generated.degraded,
        "generation served"
    );

    Json(GenerateResponse {
        output: generated.text,
        meta: GenerationMeta {
            plan: context.plan,
            month: reservation.month,
            used: reservation.allowance.used,
            remaining: reservation.allowance.remaining,
        },
    })
    .into_response()
}
