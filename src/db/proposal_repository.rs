use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::proposal::{Proposal, ProposalUpdate, PublicProposal};

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    /// Inserts a DRAFT at the project's next version number.
    async fn create_proposal(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        sections: &Value,
    ) -> Result<Proposal, sqlx::Error>;

    async fn list_proposals(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Proposal>, sqlx::Error>;

    async fn find_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<Proposal>, sqlx::Error>;

    /// Not org-scoped: the token itself is the credential.
    async fn find_public_proposal(
        &self,
        token: &str,
    ) -> Result<Option<PublicProposal>, sqlx::Error>;

    async fn update_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
        update: &ProposalUpdate,
    ) -> Result<Option<Proposal>, sqlx::Error>;

    /// Moves a DRAFT to SENT; later statuses are left alone. An existing
    /// public token is kept, otherwise `token` is stored.
    async fn publish_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
        token: &str,
    ) -> Result<Option<Proposal>, sqlx::Error>;

    async fn delete_proposal(&self, org_id: Uuid, proposal_id: Uuid) -> Result<bool, sqlx::Error>;
}
