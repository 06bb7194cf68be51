use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::proposal_repository::ProposalRepository;
use crate::models::proposal::{Proposal, ProposalStatus, ProposalUpdate, PublicProposal};

pub struct PostgresProposalRepository {
    pub pool: PgPool,
}

#[async_trait]
impl ProposalRepository for PostgresProposalRepository {
    async fn create_proposal(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        sections: &Value,
    ) -> Result<Proposal, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the parent project serializes version numbering.
        sqlx::query("SELECT id FROM projects WHERE id = $1 AND org_id = $2 FOR UPDATE")
            .bind(project_id)
            .bind(org_id)
            .fetch_one(&mut *tx)
            .await?;

        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            INSERT INTO proposals (org_id, project_id, version, status, sections)
            SELECT $1, $2, COALESCE(MAX(version), 0) + 1, $3, $4
            FROM proposals
            WHERE project_id = $2
            RETURNING id, org_id, project_id, version, status, sections, public_token, created_at
            "#,
        )
        .bind(org_id)
        .bind(project_id)
        .bind(ProposalStatus::Draft)
        .bind(sections)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(proposal)
    }

    async fn list_proposals(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Proposal>, sqlx::Error> {
        sqlx::query_as::<_, Proposal>(
            r#"
            SELECT id, org_id, project_id, version, status, sections, public_token, created_at
            FROM proposals
            WHERE org_id = $1 AND project_id = $2
            ORDER BY version DESC
            "#,
        )
        .bind(org_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        sqlx::query_as::<_, Proposal>(
            r#"
            SELECT id, org_id, project_id, version, status, sections, public_token, created_at
            FROM proposals
            WHERE id = $1 AND org_id = $2
            "#,
        )
        .bind(proposal_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_public_proposal(
        &self,
        token: &str,
    ) -> Result<Option<PublicProposal>, sqlx::Error> {
        sqlx::query_as::<_, PublicProposal>(
            r#"
            SELECT p.title AS project_title, pr.version, pr.status, pr.sections, pr.created_at
            FROM proposals pr
            JOIN projects p ON p.id = pr.project_id
            WHERE pr.public_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
        update: &ProposalUpdate,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        sqlx::query_as::<_, Proposal>(
            r#"
            UPDATE proposals
            SET sections = COALESCE($3, sections),
                status = COALESCE($4, status)
            WHERE id = $1 AND org_id = $2
            RETURNING id, org_id, project_id, version, status, sections, public_token, created_at
            "#,
        )
        .bind(proposal_id)
        .bind(org_id)
        .bind(update.sections.as_ref())
        .bind(update.status)
        .fetch_optional(&self.pool)
        .await
    }

    async fn publish_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
        token: &str,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        sqlx::query_as::<_, Proposal>(
            r#"
            UPDATE proposals
            SET status = CASE WHEN status = $5 THEN $3 ELSE status END,
                public_token = COALESCE(public_token, $4)
            WHERE id = $1 AND org_id = $2
            RETURNING id, org_id, project_id, version, status, sections, public_token, created_at
            "#,
        )
        .bind(proposal_id)
        .bind(org_id)
        .bind(ProposalStatus::Sent)
        .bind(token)
        .bind(ProposalStatus::Draft)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_proposal(&self, org_id: Uuid, proposal_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM proposals WHERE id = $1 AND org_id = $2")
            .bind(proposal_id)
            .bind(org_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
