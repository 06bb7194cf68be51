use std::sync::Arc;

use tracing::debug;

use super::error::TenancyError;
use crate::db::user_repository::UserRepository;
use crate::models::user::{Principal, User};

/// Maps an identity-provider principal onto a `users` row.
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Creates the user on first sight. Concurrent first calls converge on
    /// one row through the `external_id` unique constraint.
    pub async fn resolve_user(&self, principal: &Principal) -> Result<User, TenancyError> {
        let external_id = principal.external_id.trim();
        if external_id.is_empty() {
            return Err(TenancyError::Unauthenticated);
        }

        let user = self
            .users
            .upsert_user(external_id, principal.email_hint())
            .await?;
        debug!(user_id = %user.id, "resolved user");
        Ok(user)
    }
}
