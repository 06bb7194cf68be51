use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::usage_repository::UsageRepository;
use crate::models::usage::UsageIncrement;

pub struct PostgresUsageRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn get_usage(&self, org_id: Uuid, month: &str) -> Result<i64, sqlx::Error> {
        let generations = sqlx::query_scalar::<_, i64>(
            "SELECT generations FROM usage_records WHERE org_id = $1 AND month = $2",
        )
        .bind(org_id)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;

        Ok(generations.unwrap_or(0))
    }

    async fn increment_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO usage_records (org_id, month, generations)
            VALUES ($1, $2, $3)
            ON CONFLICT (org_id, month) DO UPDATE
                SET generations = usage_records.generations + EXCLUDED.generations
            RETURNING generations
            "#,
        )
        .bind(org_id)
        .bind(month)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
    }

    async fn try_increment_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
        limit: i64,
    ) -> Result<UsageIncrement, sqlx::Error> {
        // The conflicting row is locked by ON CONFLICT, so the WHERE guard and
        // the increment are evaluated together.
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO usage_records (org_id, month, generations)
            SELECT $1, $2, $3
            WHERE $3 <= $4
            ON CONFLICT (org_id, month) DO UPDATE
                SET generations = usage_records.generations + EXCLUDED.generations
                WHERE usage_records.generations + EXCLUDED.generations <= $4
            RETURNING generations
            "#,
        )
        .bind(org_id)
        .bind(month)
        .bind(amount)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(generations) => Ok(UsageIncrement {
                applied: true,
                generations,
            }),
            None => Ok(UsageIncrement {
                applied: false,
                generations: self.get_usage(org_id, month).await?,
            }),
        }
    }

    async fn release_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE usage_records
            SET generations = GREATEST(generations - $3, 0)
            WHERE org_id = $1 AND month = $2
            "#,
        )
        .bind(org_id)
        .bind(month)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
