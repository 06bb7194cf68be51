use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db::project_repository::CreateProjectOutcome;
use crate::models::project::{NewProject, ProjectUpdate, DEFAULT_PROJECT_STATUS};
use crate::responses::JsonResponse;
use crate::routes::{
    auth::AuthSession,
    input::{require_non_empty, Validate, ValidatedJson},
    tenant::load_tenant,
};
use crate::state::AppState;
use crate::tenancy::{roles::authorize, ActionKind, Permission, TenancyError};

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
}

impl Validate for CreateProjectRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("title", &self.title, 200)?;
        if let Some(status) = &self.status {
            require_non_empty("status", status, 32)?;
        }
        match self.estimated_value {
            Some(value) if !value.is_finite() || value < 0.0 => {
                Err("estimated_value must be a non-negative number".into())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
}

impl Validate for UpdateProjectRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            require_non_empty("title", title, 200)?;
        }
        if let Some(status) = &self.status {
            require_non_empty("status", status, 32)?;
        }
        if matches!(self.estimated_value, Some(value) if !value.is_finite() || value < 0.0) {
            return Err("estimated_value must be a non-negative number".into());
        }
        if self.title.is_none() && self.status.is_none() && self.estimated_value.is_none() {
            return Err("nothing to update".into());
        }
        Ok(())
    }
}

impl From<UpdateProjectRequest> for ProjectUpdate {
    fn from(req: UpdateProjectRequest) -> Self {
        ProjectUpdate {
            title: req.title.map(|title| title.trim().to_string()),
            status: req.status.map(|status| status.trim().to_string()),
            estimated_value: req.estimated_value,
        }
    }
}

pub async fn list_projects(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    match app_state.projects.list_projects(context.org_id).await {
        Ok(projects) => Json(projects).into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

/// FREE orgs are capped at the project limit; the count and insert share
/// one org-scoped lock.
pub async fn create_project(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    ValidatedJson(payload): ValidatedJson<CreateProjectRequest>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    let limit = app_state
        .config
        .plan_limits
        .limit_for(context.plan, ActionKind::ProjectCount);
    let project = NewProject {
        org_id: context.org_id,
        owner_id: context.user_id,
        client_id: payload.client_id,
        title: payload.title.trim().to_string(),
        status: payload
            .status
            .map(|status| status.trim().to_string())
            .unwrap_or_else(|| DEFAULT_PROJECT_STATUS.to_string()),
        estimated_value: payload.estimated_value,
    };

    match app_state.projects.create_project(&project, limit).await {
        Ok(CreateProjectOutcome::Created(project)) => {
            info!(org_id = %context.org_id, project_id = %project.id, "project created");
            (StatusCode::CREATED, Json(project)).into_response()
        }
        Ok(CreateProjectOutcome::LimitReached { current }) => TenancyError::QuotaExceeded {
            action: ActionKind::ProjectCount,
            limit: limit.unwrap_or(current),
            remaining: 0,
        }
        .into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

pub async fn get_project(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(project_id): Path<Uuid>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    match app_state
        .projects
        .find_project(context.org_id, project_id)
        .await
    {
        Ok(Some(project)) => Json(project).into_response(),
        Ok(None) => TenancyError::NotFound("project").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

/// Any member may edit project details; deletion stays OWNER/ADMIN.
pub async fn update_project(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(project_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProjectRequest>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(context.role, Permission::Contribute) {
        return err.into_response();
    }

    let update = ProjectUpdate::from(payload);
    match app_state
        .projects
        .update_project(context.org_id, project_id, &update)
        .await
    {
        Ok(Some(project)) => {
            info!(org_id = %context.org_id, %project_id, "project updated");
            Json(project).into_response()
        }
        Ok(None) => TenancyError::NotFound("project").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}

pub async fn delete_project(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(project_id): Path<Uuid>,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(context.role, Permission::DeleteProject) {
        return err.into_response();
    }

    match app_state
        .projects
        .delete_project(context.org_id, project_id)
        .await
    {
        Ok(true) => {
            info!(org_id = %context.org_id, %project_id, "project deleted");
            JsonResponse::success("Project deleted").into_response()
        }
        Ok(false) => TenancyError::NotFound("project").into_response(),
        Err(err) => TenancyError::from(err).into_response(),
    }
}
