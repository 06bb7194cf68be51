use async_trait::async_trait;
use uuid::Uuid;

use crate::models::organization::{
    ActiveMembership, MemberSummary, Membership, MembershipRole, ProvisionedTenant,
};

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// The user's earliest-created membership with its organization and
    /// subscription. Ties on `created_at` fall back to the membership id.
    async fn find_active_membership(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ActiveMembership>, sqlx::Error>;

    /// Creates organization, FREE subscription and OWNER membership in one
    /// transaction, serialized per user. Returns the existing tenant with
    /// `created = false` when the user already has a membership.
    async fn provision_tenant(
        &self,
        user_id: Uuid,
        org_name: &str,
    ) -> Result<ProvisionedTenant, sqlx::Error>;

    async fn find_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, sqlx::Error>;

    /// Returns `true` when a new membership row was written.
    async fn add_member(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
    ) -> Result<bool, sqlx::Error>;

    async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberSummary>, sqlx::Error>;
}
