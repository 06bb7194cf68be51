use thiserror::Error;
use uuid::Uuid;

use super::allowance::ActionKind;
use super::roles::Permission;
use crate::models::organization::MembershipRole;

#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("no tenant context for user {user_id} after provisioning")]
    NoTenantContext { user_id: Uuid },
    #[error("{action} quota exceeded (limit {limit}, remaining {remaining})")]
    QuotaExceeded {
        action: ActionKind,
        limit: i64,
        remaining: i64,
    },
    #[error("role {role} is not permitted to {action}")]
    Forbidden {
        action: Permission,
        role: MembershipRole,
    },
    #[error("rate limited; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("webhook signature verification failed")]
    SignatureInvalid,
    #[error("upstream provider error: {0}")]
    UpstreamProvider(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}
