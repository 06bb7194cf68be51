use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::subscription::{Subscription, SubscriptionUpgrade};

/// Result of applying a checkout upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Applied {
        subscription: Subscription,
        /// The event id was already in `stripe_event_log`.
        replay: bool,
    },
    UnknownOrganization,
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn get_subscription(&self, org_id: Uuid) -> Result<Option<Subscription>, sqlx::Error>;

    /// Upserts the org's subscription to PRO and records `event_id`, in one
    /// transaction. Provider ids are kept when the upgrade carries none.
    async fn upgrade_subscription(
        &self,
        upgrade: &SubscriptionUpgrade,
        event_id: &str,
    ) -> Result<UpgradeOutcome, sqlx::Error>;

    async fn set_current_period_end(
        &self,
        org_id: Uuid,
        period_end: OffsetDateTime,
    ) -> Result<(), sqlx::Error>;
}
