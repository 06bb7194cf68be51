use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::subscription_repository::{SubscriptionRepository, UpgradeOutcome};
use crate::models::subscription::{Plan, Subscription, SubscriptionUpgrade};

pub struct PostgresSubscriptionRepository {
    pub pool: PgPool,
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn get_subscription(&self, org_id: Uuid) -> Result<Option<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT org_id, plan, stripe_customer_id, stripe_subscription_id,
                   current_period_end, updated_at
            FROM subscriptions
            WHERE org_id = $1
            "#,
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn upgrade_subscription(
        &self,
        upgrade: &SubscriptionUpgrade,
        event_id: &str,
    ) -> Result<UpgradeOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let org_exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM organizations WHERE id = $1")
            .bind(upgrade.org_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        if !org_exists {
            tx.rollback().await?;
            return Ok(UpgradeOutcome::UnknownOrganization);
        }

        let recorded = sqlx::query(
            r#"
            INSERT INTO stripe_event_log (event_id)
            VALUES ($1)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (org_id, plan, stripe_customer_id, stripe_subscription_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (org_id) DO UPDATE
                SET plan = EXCLUDED.plan,
                    stripe_customer_id = COALESCE(EXCLUDED.stripe_customer_id, subscriptions.stripe_customer_id),
                    stripe_subscription_id = COALESCE(EXCLUDED.stripe_subscription_id, subscriptions.stripe_subscription_id),
                    updated_at = now()
            RETURNING org_id, plan, stripe_customer_id, stripe_subscription_id,
                      current_period_end, updated_at
            "#,
        )
        .bind(upgrade.org_id)
        .bind(Plan::Pro)
        .bind(upgrade.stripe_customer_id.as_deref())
        .bind(upgrade.stripe_subscription_id.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(UpgradeOutcome::Applied {
            subscription,
            replay: recorded == 0,
        })
    }

    async fn set_current_period_end(
        &self,
        org_id: Uuid,
        period_end: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET current_period_end = $2, updated_at = now()
            WHERE org_id = $1
            "#,
        )
        .bind(org_id)
        .bind(period_end)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
