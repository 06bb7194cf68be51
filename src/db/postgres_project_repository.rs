use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::project_repository::{CreateProjectOutcome, ProjectRepository};
use crate::models::project::{NewProject, Project, ProjectUpdate};

pub struct PostgresProjectRepository {
    pub pool: PgPool,
}

#[async_trait]
impl ProjectRepository for PostgresProjectRepository {
    async fn count_projects(&self, org_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM projects WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn create_project(
        &self,
        project: &NewProject,
        limit: Option<i64>,
    ) -> Result<CreateProjectOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('projects:' || $1::text, 0))")
            .bind(project.org_id)
            .execute(&mut *tx)
            .await?;

        if let Some(limit) = limit {
            let current =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM projects WHERE org_id = $1")
                    .bind(project.org_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if current >= limit {
                tx.rollback().await?;
                return Ok(CreateProjectOutcome::LimitReached { current });
            }
        }

        let created = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (org_id, owner_id, client_id, title, status, estimated_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, org_id, owner_id, client_id, title, status, estimated_value,
                      created_at, updated_at
            "#,
        )
        .bind(project.org_id)
        .bind(project.owner_id)
        .bind(project.client_id)
        .bind(&project.title)
        .bind(&project.status)
        .bind(project.estimated_value)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CreateProjectOutcome::Created(created))
    }

    async fn list_projects(&self, org_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, org_id, owner_id, client_id, title, status, estimated_value,
                   created_at, updated_at
            FROM projects
            WHERE org_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, org_id, owner_id, client_id, title, status, estimated_value,
                   created_at, updated_at
            FROM projects
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(org_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        update: &ProjectUpdate,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET title = COALESCE($3, title),
                status = COALESCE($4, status),
                estimated_value = COALESCE($5, estimated_value),
                updated_at = now()
            WHERE org_id = $1 AND id = $2
            RETURNING id, org_id, owner_id, client_id, title, status, estimated_value,
                      created_at, updated_at
            "#,
        )
        .bind(org_id)
        .bind(project_id)
        .bind(update.title.as_deref())
        .bind(update.status.as_deref())
        .bind(update.estimated_value)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_project(&self, org_id: Uuid, project_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
