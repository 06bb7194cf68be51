use async_trait::async_trait;
use uuid::Uuid;

use crate::models::usage::UsageIncrement;

/// Per-org, per-month generation counters. `month` is a `YYYY-MM` key.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn get_usage(&self, org_id: Uuid, month: &str) -> Result<i64, sqlx::Error>;

    /// Unconditional atomic increment. Returns the new total.
    async fn increment_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
    ) -> Result<i64, sqlx::Error>;

    /// Increments only while the total stays within `limit`.
    async fn try_increment_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
        limit: i64,
    ) -> Result<UsageIncrement, sqlx::Error>;

    /// Gives back a reservation. Never drops the counter below zero.
    async fn release_usage(&self, org_id: Uuid, month: &str, amount: i64)
        -> Result<(), sqlx::Error>;
}
