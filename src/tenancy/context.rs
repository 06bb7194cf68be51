use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::allowance::{ActionKind, Remaining};
use super::error::TenancyError;
use super::provisioning::TenantProvisioner;
use super::usage::{current_month_key, UsageLedger};
use crate::db::organization_repository::OrganizationRepository;
use crate::models::organization::{ActiveMembership, MembershipRole};
use crate::models::subscription::Plan;
use crate::models::user::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub month: String,
    pub used: i64,
    pub limit: Option<i64>,
    pub remaining: Remaining,
}

/// Read-only view of the caller's active tenant, consumed by every
/// authorization and quota decision downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub org_id: Uuid,
    pub org_name: String,
    pub user_id: Uuid,
    pub role: MembershipRole,
    pub plan: Plan,
    pub is_owner_or_admin: bool,
    pub usage: UsageSnapshot,
}

#[derive(Clone)]
pub struct TenantContextResolver {
    organizations: Arc<dyn OrganizationRepository>,
    provisioner: TenantProvisioner,
    ledger: UsageLedger,
}

impl TenantContextResolver {
    pub fn new(
        organizations: Arc<dyn OrganizationRepository>,
        provisioner: TenantProvisioner,
        ledger: UsageLedger,
    ) -> Self {
        Self {
            organizations,
            provisioner,
            ledger,
        }
    }

    /// Pure read: the earliest membership, or `None` when the user has none.
    pub async fn try_resolve(&self, user: &User) -> Result<Option<TenantContext>, TenancyError> {
        let Some(active) = self.organizations.find_active_membership(user.id).await? else {
            return Ok(None);
        };
        Ok(Some(self.build_context(active).await?))
    }

    /// Provisions a tenant, then re-reads through [`Self::try_resolve`].
    pub async fn provision_and_resolve(
        &self,
        user: &User,
        display_name: Option<&str>,
    ) -> Result<TenantContext, TenancyError> {
        self.provisioner.provision_tenant(user, display_name).await?;

        match self.try_resolve(user).await? {
            Some(context) => Ok(context),
            None => {
                error!(user_id = %user.id, "tenant missing right after provisioning");
                Err(TenancyError::NoTenantContext { user_id: user.id })
            }
        }
    }

    /// Resolves the caller's tenant. On a miss this provisions one, so a
    /// first dashboard load writes.
    pub async fn get_active_tenant_context(
        &self,
        user: &User,
        display_name: Option<&str>,
    ) -> Result<TenantContext, TenancyError> {
        if let Some(context) = self.try_resolve(user).await? {
            return Ok(context);
        }
        info!(user_id = %user.id, "no membership found; provisioning tenant");
        self.provision_and_resolve(user, display_name).await
    }

    async fn build_context(&self, active: ActiveMembership) -> Result<TenantContext, TenancyError> {
        let plan = active
            .subscription
            .as_ref()
            .map(|subscription| subscription.plan)
            .unwrap_or(Plan::Free);
        let org_id = active.organization.id;

        let month = current_month_key();
        let used = self.ledger.usage_for_month(org_id, &month).await?;
        let allowance = self
            .ledger
            .limits()
            .evaluate(plan, used, ActionKind::Generation);

        Ok(TenantContext {
            org_id,
            org_name: active.organization.name,
            user_id: active.membership.user_id,
            role: active.membership.role,
            plan,
            is_owner_or_admin: active.membership.role.is_owner_or_admin(),
            usage: UsageSnapshot {
                month,
                used,
                limit: allowance.limit,
                remaining: allowance.remaining,
            },
        })
    }
}
