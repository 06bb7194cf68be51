use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::organization_repository::OrganizationRepository;
use crate::models::organization::{
    ActiveMembership, MemberSummary, Membership, MembershipRole, Organization, ProvisionedTenant,
};
use crate::models::subscription::{Plan, Subscription};

pub struct PostgresOrganizationRepository {
    pub pool: PgPool,
}

#[derive(FromRow)]
struct ActiveMembershipRow {
    membership_id: Uuid,
    org_id: Uuid,
    user_id: Uuid,
    role: MembershipRole,
    membership_created_at: OffsetDateTime,
    org_name: String,
    org_created_at: OffsetDateTime,
    plan: Option<Plan>,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    current_period_end: Option<OffsetDateTime>,
    subscription_updated_at: Option<OffsetDateTime>,
}

impl From<ActiveMembershipRow> for ActiveMembership {
    fn from(row: ActiveMembershipRow) -> Self {
        let subscription = match (row.plan, row.subscription_updated_at) {
            (Some(plan), Some(updated_at)) => Some(Subscription {
                org_id: row.org_id,
                plan,
                stripe_customer_id: row.stripe_customer_id,
                stripe_subscription_id: row.stripe_subscription_id,
                current_period_end: row.current_period_end,
                updated_at,
            }),
            _ => None,
        };

        ActiveMembership {
            membership: Membership {
                id: row.membership_id,
                org_id: row.org_id,
                user_id: row.user_id,
                role: row.role,
                created_at: row.membership_created_at,
            },
            organization: Organization {
                id: row.org_id,
                name: row.org_name,
                created_at: row.org_created_at,
            },
            subscription,
        }
    }
}

const ACTIVE_MEMBERSHIP_SQL: &str = r#"
    SELECT
        m.id AS membership_id,
        m.org_id,
        m.user_id,
        m.role,
        m.created_at AS membership_created_at,
        o.name AS org_name,
        o.created_at AS org_created_at,
        s.plan,
        s.stripe_customer_id,
        s.stripe_subscription_id,
        s.current_period_end,
        s.updated_at AS subscription_updated_at
    FROM memberships m
    JOIN organizations o ON o.id = m.org_id
    LEFT JOIN subscriptions s ON s.org_id = m.org_id
    WHERE m.user_id = $1
    ORDER BY m.created_at ASC, m.id ASC
    LIMIT 1
"#;

async fn ensure_free_subscription(
    conn: &mut PgConnection,
    org_id: Uuid,
) -> Result<Subscription, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (org_id, plan)
        VALUES ($1, $2)
        ON CONFLICT (org_id) DO NOTHING
        "#,
    )
    .bind(org_id)
    .bind(Plan::Free)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, Subscription>(
        r#"
        SELECT org_id, plan, stripe_customer_id, stripe_subscription_id,
               current_period_end, updated_at
        FROM subscriptions
        WHERE org_id = $1
        "#,
    )
    .bind(org_id)
    .fetch_one(&mut *conn)
    .await
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    async fn find_active_membership(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ActiveMembership>, sqlx::Error> {
        let row = sqlx::query_as::<_, ActiveMembershipRow>(ACTIVE_MEMBERSHIP_SQL)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ActiveMembership::from))
    }

    async fn provision_tenant(
        &self,
        user_id: Uuid,
        org_name: &str,
    ) -> Result<ProvisionedTenant, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Serializes provisioning per user across every instance sharing the database.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if let Some(existing) = sqlx::query_as::<_, ActiveMembershipRow>(ACTIVE_MEMBERSHIP_SQL)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
        {
            let existing = ActiveMembership::from(existing);
            let subscription = match existing.subscription {
                Some(subscription) => subscription,
                None => ensure_free_subscription(&mut *tx, existing.organization.id).await?,
            };
            tx.commit().await?;

            return Ok(ProvisionedTenant {
                organization: existing.organization,
                membership: existing.membership,
                subscription,
                created: false,
            });
        }

        let organization = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name)
            VALUES ($1)
            RETURNING id, name, created_at
            "#,
        )
        .bind(org_name)
        .fetch_one(&mut *tx)
        .await?;

        let subscription = ensure_free_subscription(&mut *tx, organization.id).await?;

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (org_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, org_id, user_id, role, created_at
            "#,
        )
        .bind(organization.id)
        .bind(user_id)
        .bind(MembershipRole::Owner)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ProvisionedTenant {
            organization,
            membership,
            subscription,
            created: true,
        })
    }

    async fn find_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, org_id, user_id, role, created_at
            FROM memberships
            WHERE org_id = $1 AND user_id = $2
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn add_member(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO memberships (org_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (org_id, user_id) DO NOTHING
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberSummary>, sqlx::Error> {
        sqlx::query_as::<_, MemberSummary>(
            r#"
            SELECT m.user_id, u.email, m.role
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }
}
