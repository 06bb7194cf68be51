use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::user_repository::UserRepository;
use crate::models::user::{User, UNKNOWN_EMAIL};

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn upsert_user(
        &self,
        external_id: &str,
        email_hint: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        // $2 is NULL when no hint was supplied, so COALESCE keeps the stored email.
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (external_id, email)
            VALUES ($1, COALESCE($2, $3))
            ON CONFLICT (external_id) DO UPDATE
                SET email = COALESCE($2, users.email)
            RETURNING id, external_id, email, created_at
            "#,
        )
        .bind(external_id)
        .bind(email_hint)
        .bind(UNKNOWN_EMAIL)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, external_id, email, created_at
            FROM users
            WHERE lower(email) = lower($1)
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }
}
