use async_trait::async_trait;
use uuid::Uuid;

use crate::models::project::{NewProject, Project, ProjectUpdate};

#[derive(Debug, Clone, PartialEq)]
pub enum CreateProjectOutcome {
    Created(Project),
    /// The org already holds `current` projects and `current >= limit`.
    LimitReached { current: i64 },
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn count_projects(&self, org_id: Uuid) -> Result<i64, sqlx::Error>;

    /// Counts and inserts under one org-scoped lock. `limit = None` means uncapped.
    async fn create_project(
        &self,
        project: &NewProject,
        limit: Option<i64>,
    ) -> Result<CreateProjectOutcome, sqlx::Error>;

    async fn list_projects(&self, org_id: Uuid) -> Result<Vec<Project>, sqlx::Error>;

    async fn find_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error>;

    /// Bumps `updated_at` on every successful update.
    async fn update_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        update: &ProjectUpdate,
    ) -> Result<Option<Project>, sqlx::Error>;

    async fn delete_project(&self, org_id: Uuid, project_id: Uuid) -> Result<bool, sqlx::Error>;
}
