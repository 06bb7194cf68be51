use std::collections::HashMap;

use async_trait::async_trait;

use super::{
    signature, CheckoutSession, CreateCheckoutSessionRequest, StripeEvent, StripeService,
    StripeServiceError, SubscriptionInfo,
};

pub struct LiveStripeService {
    client: stripe::Client,
    webhook_secret: String,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        let client = stripe::Client::new(secret_key);
        Self {
            client,
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(settings.secret_key.clone(), settings.webhook_secret.clone())
    }
}

fn parse_customer_id(customer: &str) -> Result<stripe::CustomerId, StripeServiceError> {
    customer
        .parse::<stripe::CustomerId>()
        .map_err(|e| StripeServiceError::Other(e.to_string()))
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Subscription);
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        params.line_items = Some(vec![stripe::CreateCheckoutSessionLineItems {
            price: Some(req.price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);
        if let Some(ref id) = req.client_reference_id {
            params.client_reference_id = Some(id);
        }
        // Stripe rejects customer and customer_email together.
        if let Some(ref customer) = req.customer {
            params.customer = Some(parse_customer_id(customer)?);
        } else if let Some(ref email) = req.customer_email {
            params.customer_email = Some(email);
        }
        if !req.metadata.is_empty() {
            let metadata: HashMap<String, String> = req.metadata.clone().into_iter().collect();
            params.metadata = Some(metadata);
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, StripeServiceError> {
        let customer = parse_customer_id(customer_id)?;
        let mut params = stripe::CreateBillingPortalSession::new(customer);
        params.return_url = Some(return_url);
        let session = stripe::BillingPortalSession::create(&self.client, params).await?;
        Ok(session.url)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        // stripe::Webhook::construct_event subtracts `t` unchecked and
        // forces the typed Event schema, so verification stays local.
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        signature::construct_event(payload, signature_header, &self.webhook_secret, now)
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        let sub_id = subscription_id
            .parse::<stripe::SubscriptionId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let sub = stripe::Subscription::retrieve(&self.client, &sub_id, &[]).await?;
        Ok(SubscriptionInfo {
            id: sub.id.to_string(),
            status: sub.status.to_string(),
            current_period_end: sub.current_period_end,
        })
    }
}
