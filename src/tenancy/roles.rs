use std::fmt;

use serde::Serialize;

use super::error::TenancyError;
use crate::models::organization::MembershipRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageBilling,
    InviteMembers,
    DeleteProject,
    DeleteProposal,
    Contribute,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Permission::ManageBilling => "manage billing",
            Permission::InviteMembers => "invite members",
            Permission::DeleteProject => "delete projects",
            Permission::DeleteProposal => "delete proposals",
            Permission::Contribute => "contribute",
        };
        f.write_str(label)
    }
}

pub fn can_manage_billing(role: MembershipRole) -> bool {
    role.is_owner_or_admin()
}

pub fn can_invite_members(role: MembershipRole) -> bool {
    role.is_owner_or_admin()
}

pub fn can_delete_project(role: MembershipRole) -> bool {
    role.is_owner_or_admin()
}

pub fn can_contribute(_role: MembershipRole) -> bool {
    true
}

pub fn permits(role: MembershipRole, permission: Permission) -> bool {
    match permission {
        Permission::ManageBilling => can_manage_billing(role),
        Permission::InviteMembers => can_invite_members(role),
        Permission::DeleteProject | Permission::DeleteProposal => can_delete_project(role),
        Permission::Contribute => can_contribute(role),
    }
}

pub fn authorize(role: MembershipRole, permission: Permission) -> Result<(), TenancyError> {
    if permits(role, permission) {
        Ok(())
    } else {
        Err(TenancyError::Forbidden {
            action: permission,
            role,
        })
    }
}
