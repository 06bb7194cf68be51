use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::{
    signature, CheckoutSession, CreateCheckoutSessionRequest, StripeEvent, StripeService,
    StripeServiceError, SubscriptionInfo,
};

pub const MOCK_WEBHOOK_SECRET: &str = "whsec_test";

/// Test double that still verifies webhook signatures against
/// [`MOCK_WEBHOOK_SECRET`].
#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub last_create_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub portal_requests: Arc<Mutex<Vec<(String, String)>>>,
    pub subscription: Arc<Mutex<Option<SubscriptionInfo>>>,
    pub fail_api: Arc<AtomicBool>,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscription(self, id: &str, period_end: i64) -> Self {
        *self.subscription.lock().unwrap() = Some(SubscriptionInfo {
            id: id.to_string(),
            status: "active".into(),
            current_period_end: period_end,
        });
        self
    }

    /// Signs `payload` with the mock secret at the current time.
    pub fn sign(payload: &[u8]) -> String {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        signature::sign_payload(payload, MOCK_WEBHOOK_SECRET, now)
    }

    fn check_api(&self) -> Result<(), StripeServiceError> {
        if self.fail_api.load(Ordering::SeqCst) {
            Err(StripeServiceError::Api("mock api failure".into()))
        } else {
            Ok(())
        }
    }
}

fn make_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{}_{}", prefix, ts)
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        self.check_api()?;
        self.last_create_requests.lock().unwrap().push(req);

        let session = CheckoutSession {
            id: make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        };
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, StripeServiceError> {
        self.check_api()?;
        self.portal_requests
            .lock()
            .unwrap()
            .push((customer_id.to_string(), return_url.to_string()));
        Ok("https://example.test/portal".into())
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        signature::construct_event(payload, signature_header, MOCK_WEBHOOK_SECRET, now)
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        self.check_api()?;
        self.subscription
            .lock()
            .unwrap()
            .clone()
            .filter(|sub| sub.id == subscription_id)
            .ok_or_else(|| StripeServiceError::Api(format!("no such subscription: {subscription_id}")))
    }
}
