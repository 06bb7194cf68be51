use std::sync::Arc;

use crate::config::Config;
use crate::db::{
    health::DatabaseHealth, organization_repository::OrganizationRepository,
    project_repository::ProjectRepository, proposal_repository::ProposalRepository,
    subscription_repository::SubscriptionRepository, usage_repository::UsageRepository,
    user_repository::UserRepository,
};
use crate::services::generation::TextGenerator;
use crate::services::stripe::StripeService;
use crate::tenancy::{
    BillingEventApplier, IdentityResolver, TenantContextResolver, TenantProvisioner, UsageLedger,
};
use crate::utils::jwt::{JwtKeyProvider, JwtKeys};
use crate::utils::rate_limit::OrgRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub proposals: Arc<dyn ProposalRepository>,
    pub health: Arc<dyn DatabaseHealth>,
    pub stripe: Arc<dyn StripeService>,
    pub generator: Arc<dyn TextGenerator>,
    pub rate_limiter: Arc<OrgRateLimiter>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}

impl AppState {
    pub fn identity(&self) -> IdentityResolver {
        IdentityResolver::new(self.users.clone())
    }

    pub fn usage_ledger(&self) -> UsageLedger {
        UsageLedger::new(
            self.usage.clone(),
            self.subscriptions.clone(),
            self.projects.clone(),
            self.config.plan_limits,
        )
    }

    pub fn tenant_contexts(&self) -> TenantContextResolver {
        TenantContextResolver::new(
            self.organizations.clone(),
            TenantProvisioner::new(self.organizations.clone()),
            self.usage_ledger(),
        )
    }

    pub fn billing_applier(&self) -> BillingEventApplier {
        BillingEventApplier::new(self.subscriptions.clone(), self.stripe.clone())
    }
}

impl JwtKeyProvider for AppState {
    fn jwt_keys(&self) -> &JwtKeys {
        &self.jwt_keys
    }

    fn jwt_issuer(&self) -> &str {
        &self.config.auth.jwt_issuer
    }

    fn jwt_audience(&self) -> &str {
        &self.config.auth.jwt_audience
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::db::mock_db::{InMemoryTenantRepository, MockHealth};
    use crate::routes::auth::claims::Claims;
    use crate::services::generation::mock::MockTextGenerator;
    use crate::services::stripe::MockStripeService;
    use crate::utils::jwt::create_jwt;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub struct TestHarness {
        pub state: AppState,
        pub repo: Arc<InMemoryTenantRepository>,
        pub stripe: MockStripeService,
        pub generator: Arc<MockTextGenerator>,
    }

    impl TestHarness {
        pub fn new() -> Self {
            Self::with(Config::test_config(), MockTextGenerator::default())
        }

        pub fn with(config: Config, generator: MockTextGenerator) -> Self {
            let repo = Arc::new(InMemoryTenantRepository::new());
            let stripe = MockStripeService::new();
            let generator = Arc::new(generator);
            let jwt_keys = JwtKeys::from_secret(&config.auth.jwt_secret)
                .expect("test JWT secret should be valid");

            let state = AppState {
                users: repo.clone(),
                organizations: repo.clone(),
                subscriptions: repo.clone(),
                usage: repo.clone(),
                projects: repo.clone(),
                proposals: repo.clone(),
                health: Arc::new(MockHealth { healthy: true }),
                stripe: Arc::new(stripe.clone()),
                generator: generator.clone(),
                rate_limiter: Arc::new(OrgRateLimiter::new(Duration::from_millis(
                    config.org_rate_limit_ms,
                ))),
                config: Arc::new(config),
                jwt_keys: Arc::new(jwt_keys),
            };

            Self {
                state,
                repo,
                stripe,
                generator,
            }
        }

        /// Bearer token for a principal with the given id and first name.
        pub fn token_for(&self, sub: &str, first_name: Option<&str>) -> String {
            let exp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 3600;
            let claims = Claims {
                sub: sub.to_string(),
                email: Some(format!("{}@example.com", sub.replace('|', "_"))),
                first_name: first_name.map(str::to_string),
                exp: exp as usize,
                iss: String::new(),
                aud: String::new(),
            };
            create_jwt(
                claims,
                &self.state.jwt_keys,
                &self.state.config.auth.jwt_issuer,
                &self.state.config.auth.jwt_audience,
            )
            .unwrap()
        }
    }
}
