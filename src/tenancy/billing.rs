use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::TenancyError;
use crate::db::subscription_repository::{SubscriptionRepository, UpgradeOutcome};
use crate::models::subscription::SubscriptionUpgrade;
use crate::services::stripe::{StripeEvent, StripeService, StripeServiceError};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Metadata key attached to checkout sessions.
pub const ORG_ID_METADATA_KEY: &str = "org_id";
const LEGACY_ORG_ID_METADATA_KEY: &str = "orgId";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Upgraded { org_id: Uuid, replay: bool },
    MissingOrgId,
    UnknownOrganization { org_id: Uuid },
    Ignored { event_type: String },
}

/// Applies payment-provider callbacks to subscription rows. Runs without a
/// caller identity: the org id travels in checkout metadata.
#[derive(Clone)]
pub struct BillingEventApplier {
    subscriptions: Arc<dyn SubscriptionRepository>,
    stripe: Arc<dyn StripeService>,
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        // Expanded objects carry the id inside.
        Value::Object(inner) => inner
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn org_id_from(object: &Value) -> Option<Uuid> {
    let metadata = object.get("metadata")?;
    metadata
        .get(ORG_ID_METADATA_KEY)
        .or_else(|| metadata.get(LEGACY_ORG_ID_METADATA_KEY))
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
}

impl BillingEventApplier {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        stripe: Arc<dyn StripeService>,
    ) -> Self {
        Self {
            subscriptions,
            stripe,
        }
    }

    /// Verifies the signature before anything is read from the payload.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, TenancyError> {
        let event = match self.stripe.verify_webhook(payload, signature) {
            Ok(event) => event,
            Err(StripeServiceError::Webhook(reason)) => {
                warn!(%reason, "rejected stripe webhook");
                return Err(TenancyError::SignatureInvalid);
            }
            Err(err) => {
                warn!(?err, "unreadable stripe webhook payload");
                return Err(TenancyError::InvalidInput(err.to_string()));
            }
        };

        if event.r#type != CHECKOUT_COMPLETED {
            info!(event_id = %event.id, event_type = %event.r#type, "ignoring stripe event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.r#type,
            });
        }

        self.apply_checkout_completed(&event).await
    }

    /// Upgrades the org named in the session metadata to PRO. Replays
    /// converge on the same row.
    pub async fn apply_checkout_completed(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, TenancyError> {
        let session = event
            .payload
            .get("data")
            .and_then(|data| data.get("object"))
            .unwrap_or(&Value::Null);

        let Some(org_id) = org_id_from(session) else {
            warn!(event_id = %event.id, "checkout completed without org_id metadata");
            return Ok(WebhookOutcome::MissingOrgId);
        };

        let upgrade = SubscriptionUpgrade {
            org_id,
            stripe_customer_id: string_field(session, "customer"),
            stripe_subscription_id: string_field(session, "subscription"),
        };

        let (subscription, replay) = match self
            .subscriptions
            .upgrade_subscription(&upgrade, &event.id)
            .await?
        {
            UpgradeOutcome::UnknownOrganization => {
                warn!(%org_id, event_id = %event.id, "checkout completed for unknown org");
                return Ok(WebhookOutcome::UnknownOrganization { org_id });
            }
            UpgradeOutcome::Applied {
                subscription,
                replay,
            } => (subscription, replay),
        };

        if replay {
            info!(%org_id, event_id = %event.id, "replayed checkout event converged");
        } else {
            info!(%org_id, event_id = %event.id, "upgraded org to PRO");
        }

        // Redeliveries retry a period lookup that failed the first time.
        if !replay || subscription.current_period_end.is_none() {
            let subscription_id = subscription
                .stripe_subscription_id
                .as_deref()
                .or(upgrade.stripe_subscription_id.as_deref());
            if let Some(subscription_id) = subscription_id {
                self.record_period_end(org_id, subscription_id).await;
            }
        }

        Ok(WebhookOutcome::Upgraded { org_id, replay })
    }

    async fn record_period_end(&self, org_id: Uuid, subscription_id: &str) {
        let info = match self.stripe.get_subscription(subscription_id).await {
            Ok(info) => info,
            Err(err) => {
                warn!(?err, %org_id, "could not fetch subscription period");
                return;
            }
        };

        let Ok(period_end) = OffsetDateTime::from_unix_timestamp(info.current_period_end) else {
            warn!(%org_id, value = info.current_period_end, "invalid period end timestamp");
            return;
        };

        if let Err(err) = self
            .subscriptions
            .set_current_period_end(org_id, period_end)
            .await
        {
            warn!(?err, %org_id, "failed to store subscription period end");
        }
    }
}
