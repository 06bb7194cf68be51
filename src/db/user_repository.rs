use async_trait::async_trait;

use crate::models::user::User;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts the user keyed on `external_id`, or returns the existing row.
    /// A non-empty `email_hint` refreshes the stored email.
    async fn upsert_user(
        &self,
        external_id: &str,
        email_hint: Option<&str>,
    ) -> Result<User, sqlx::Error>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
}
