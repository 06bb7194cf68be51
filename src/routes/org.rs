use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::models::organization::{MemberSummary, MembershipRole};
use crate::routes::{
    auth::AuthSession,
    input::{require_non_empty, Validate, ValidatedJson},
    tenant::load_tenant,
};
use crate::state::AppState;
use crate::tenancy::{roles::authorize, Permission, TenancyError, TenantContext};

#[derive(Debug, Serialize)]
pub struct OrgContextResponse {
    pub context: TenantContext,
    pub members: Vec<MemberSummary>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

impl Validate for InviteRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("email", &self.email, 320)?;
        if !self.email.contains('@') {
            return Err("email must be a valid address".into());
        }
        Ok(())
    }
}

pub async fn get_org_context(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    match app_state.organizations.list_members(context.org_id).await {
        Ok(members) => Json(OrgContextResponse { context, members }).into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

/// Adds an existing user as MEMBER. Unknown emails get `ok: false` so the
/// caller can ask them to sign in first.
pub async fn invite_member(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    ValidatedJson(payload): ValidatedJson<InviteRequest>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(context.role, Permission::InviteMembers) {
        return err.into_response();
    }

    let email = payload.email.trim();
    let invitee = match app_state.users.find_user_by_email(email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Json(json!({
                "ok": false,
                "message": "No account found for that email. Ask them to sign in once first."
            }))
            .into_response()
        }
        Err(err) => return TenancyError::from(err).into_response(),
    };

    match app_state
        .organizations
        .add_member(context.org_id, invitee.id, MembershipRole::Member)
        .await
    {
        Ok(added) => {
            info!(org_id = %context.org_id, invitee = %invitee.id, added, "member invited");
            Json(json!({ "ok": true, "added": added })).into_response()
        }
        Err(err) => TenancyError::from(err).into_response(),
    }
}
