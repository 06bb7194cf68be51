use std::sync::Arc;

use tracing::info;

use super::error::TenancyError;
use crate::db::organization_repository::OrganizationRepository;
use crate::models::organization::ProvisionedTenant;
use crate::models::user::User;

const FALLBACK_WORKSPACE_NAME: &str = "My Workspace";

/// `"{FirstName} Workspace"`, or `"My Workspace"` without a usable name.
pub fn workspace_name(display_name: Option<&str>) -> String {
    match display_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("{name} Workspace"),
        None => FALLBACK_WORKSPACE_NAME.to_string(),
    }
}

#[derive(Clone)]
pub struct TenantProvisioner {
    organizations: Arc<dyn OrganizationRepository>,
}

impl TenantProvisioner {
    pub fn new(organizations: Arc<dyn OrganizationRepository>) -> Self {
        Self { organizations }
    }

    /// Creates organization, FREE subscription and OWNER membership
    /// atomically. Safe to race: a loser gets the winner's tenant back.
    pub async fn provision_tenant(
        &self,
        user: &User,
        display_name: Option<&str>,
    ) -> Result<ProvisionedTenant, TenancyError> {
        let name = workspace_name(display_name);
        let tenant = self.organizations.provision_tenant(user.id, &name).await?;

        if tenant.created {
            info!(
                user_id = %user.id,
                org_id = %tenant.organization.id,
                org_name = %tenant.organization.name,
                "provisioned tenant"
            );
        }

        Ok(tenant)
    }
}
