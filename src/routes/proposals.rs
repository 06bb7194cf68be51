use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::proposal::{Proposal, ProposalStatus, ProposalUpdate};
use crate::responses::JsonResponse;
use crate::routes::{
    auth::AuthSession,
    input::{require_non_empty, Validate, ValidatedJson},
    tenant::load_tenant,
};
use crate::state::AppState;
use crate::tenancy::{roles::authorize, Permission, TenancyError};
use crate::utils::public_token::generate_public_token;

const MAX_BRIEF_CHARS: usize = 8000;

#[derive(Debug, Deserialize)]
pub struct ProposalListQuery {
    pub project_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct GenerateProposalRequest {
    pub project_id: Uuid,
    pub brief: String,
}

impl Validate for GenerateProposalRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("brief", &self.brief, MAX_BRIEF_CHARS)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProposalRequest {
    #[serde(default)]
    pub sections: Option<Value>,
    #[serde(default)]
    pub status: Option<ProposalStatus>,
}

impl Validate for UpdateProposalRequest {
    fn validate(&self) -> Result<(), String> {
        if matches!(&self.sections, Some(sections) if !sections.is_object()) {
            return Err("sections must be an object".into());
        }
        if self.sections.is_none() && self.status.is_none() {
            return Err("nothing to update".into());
        }
        Ok(())
    }
}

impl From<UpdateProposalRequest> for ProposalUpdate {
    fn from(req: UpdateProposalRequest) -> Self {
        ProposalUpdate {
            sections: req.sections,
            status: req.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    #[serde(flatten)]
    pub proposal: Proposal,
    pub public_url: String,
}

pub fn public_url(app_url: &str, token: &str) -> String {
    format!("{}/p/{token}", app_url.trim_end_matches('/'))
}

/// Template sections seeded from the brief.
pub fn draft_sections(project_title: &str, brief: &str) -> Value {
    json!({
        "overview": format!(
            "This proposal outlines \"{project_title}\" for your client, based on the following brief:\n\n{brief}"
        ),
        "scope": "Key scope items:\n\
            - Understand the client's goals and context\n\
            - Design and implement the agreed solution\n\
            - Iterate with feedback and track progress",
        "deliverables": "Core deliverables:\n\
            - Detailed implementation plan\n\
            - Working product / feature set\n\
            - Documentation and handover\n\
            - Post-launch support window",
        "timeline": "Indicative timeline (adjust per project):\n\
            - Week 1-2: Discovery & planning\n\
            - Week 3-4: Core build\n\
            - Week 5: Testing & polish\n\
            - Week 6: Launch & review",
        "pricing": "Pricing structure (to be customized):\n\
            - Fixed project fee OR\n\
            - Monthly retainer + success-based component\n\
            - Payment terms: e.g. 40% upfront, 40% on milestones, 20% on completion",
    })
}

pub async fn list_proposals(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Query(query): Query<ProposalListQuery>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    match app_state
        .proposals
        .list_proposals(context.org_id, query.project_id)
        .await
    {
        Ok(proposals) => Json(proposals).into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

/// Metered against the monthly generation quota. The reservation is handed
/// back if the draft cannot be stored.
pub async fn generate_proposal(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    ValidatedJson(payload): ValidatedJson<GenerateProposalRequest>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    let project = match app_state
        .projects
        .find_project(context.org_id, payload.project_id)
        .await
    {
        Ok(Some(project)) => project,
        Ok(None) => return TenancyError::NotFound("project").into_response(),
        Err(err) => return TenancyError::from(err).into_response(),
    };

    let ledger = app_state.usage_ledger();
    let reservation = match ledger.try_consume(context.org_id, context.plan, 1).await {
        Ok(reservation) => reservation,
        Err(err) => return err.into_response(),
    };

    let sections = draft_sections(&project.title, payload.brief.trim());
    match app_state
        .proposals
        .create_proposal(context.org_id, project.id, &sections)
        .await
    {
        Ok(proposal) => {
            info!(
                org_id = %context.org_id,
                project_id = %project.id,
                version = proposal.version,
                "proposal drafted"
            );
            (StatusCode::CREATED, Json(proposal)).into_response()
        }
        Err(err) => {
            if let Err(release_err) = ledger.release_usage(&reservation).await {
                warn!(?release_err, org_id = %context.org_id, "could not release reservation");
            }
            match err {
                sqlx::Error::RowNotFound => TenancyError::NotFound("project").into_response(),
                other => TenancyError::from(other).into_response(),
            }
        }
    }
}

pub async fn get_proposal(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(proposal_id): Path<Uuid>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    match app_state
        .proposals
        .find_proposal(context.org_id, proposal_id)
        .await
    {
        Ok(Some(proposal)) => Json(proposal).into_response(),
        Ok(None) => TenancyError::NotFound("proposal").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

/// Edits sections and/or status. Any member may edit.
pub async fn update_proposal(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(proposal_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProposalRequest>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(context.role, Permission::Contribute) {
        return err.into_response();
    }

    let update = ProposalUpdate::from(payload);
    match app_state
        .proposals
        .update_proposal(context.org_id, proposal_id, &update)
        .await
    {
        Ok(Some(proposal)) => {
            info!(
                org_id = %context.org_id,
                %proposal_id,
                status = ?proposal.status,
                "proposal updated"
            );
            Json(proposal).into_response()
        }
        Ok(None) => TenancyError::NotFound("proposal").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

/// Unauthenticated read-only view keyed by the public token.
pub async fn get_public_proposal(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    match app_state.proposals.find_public_proposal(&token).await {
        Ok(Some(proposal)) => Json(proposal).into_response(),
        Ok(None) => TenancyError::NotFound("proposal").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

pub async fn publish_proposal(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(proposal_id): Path<Uuid>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    let token = generate_public_token();
    match app_state
        .proposals
        .publish_proposal(context.org_id, proposal_id, &token)
        .await
    {
        Ok(Some(proposal)) => {
            info!(org_id = %context.org_id, %proposal_id, "proposal published");
            let public_url = public_url(
                &app_state.config.app_url,
                proposal.public_token.as_deref().unwrap_or(&token),
            );
            Json(PublishResponse {
                proposal,
                public_url,
            })
            .into_response()
        }
        Ok(None) => TenancyError::NotFound("proposal").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

pub async fn delete_proposal(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(proposal_id): Path<Uuid>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(context.role, Permission::DeleteProposal) {
        return err.into_response();
    }

    match app_state
        .proposals
        .delete_proposal(context.org_id, proposal_id)
        .await
    {
        Ok(true) => JsonResponse::success("Proposal deleted").into_response(),
        Ok(false) => TenancyError::NotFound("proposal").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}
