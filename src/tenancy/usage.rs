use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::allowance::{ActionKind, Allowance, PlanLimits, Remaining};
use super::error::TenancyError;
use crate::db::project_repository::ProjectRepository;
use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::usage_repository::UsageRepository;
use crate::models::subscription::Plan;

/// `YYYY-MM` of the instant in UTC.
pub fn month_key(at: OffsetDateTime) -> String {
    let utc = at.to_offset(time::UtcOffset::UTC);
    format!("{:04}-{:02}", utc.year(), u8::from(utc.month()))
}

pub fn current_month_key() -> String {
    month_key(OffsetDateTime::now_utc())
}

/// Quota held by an in-flight metered action. Hand it back with
/// [`UsageLedger::release_usage`] when the action fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub org_id: Uuid,
    pub month: String,
    pub amount: i64,
    /// Allowance after the reservation was applied.
    pub allowance: Allowance,
}

#[derive(Clone)]
pub struct UsageLedger {
    usage: Arc<dyn UsageRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    projects: Arc<dyn ProjectRepository>,
    limits: PlanLimits,
}

impl UsageLedger {
    pub fn new(
        usage: Arc<dyn UsageRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        projects: Arc<dyn ProjectRepository>,
        limits: PlanLimits,
    ) -> Self {
        Self {
            usage,
            subscriptions,
            projects,
            limits,
        }
    }

    pub fn limits(&self) -> PlanLimits {
        self.limits
    }

    pub async fn current_month_usage(&self, org_id: Uuid) -> Result<i64, TenancyError> {
        self.usage_for_month(org_id, &current_month_key()).await
    }

    pub async fn usage_for_month(&self, org_id: Uuid, month: &str) -> Result<i64, TenancyError> {
        Ok(self.usage.get_usage(org_id, month).await?)
    }

    async fn plan_for(&self, org_id: Uuid) -> Result<Plan, TenancyError> {
        Ok(self
            .subscriptions
            .get_subscription(org_id)
            .await?
            .map(|subscription| subscription.plan)
            .unwrap_or(Plan::Free))
    }

    /// Read-only check. Looks up the org's plan first.
    pub async fn check_allowance(
        &self,
        org_id: Uuid,
        action: ActionKind,
    ) -> Result<Allowance, TenancyError> {
        let plan = self.plan_for(org_id).await?;
        self.check_allowance_for_plan(org_id, plan, action).await
    }

    pub async fn check_allowance_for_plan(
        &self,
        org_id: Uuid,
        plan: Plan,
        action: ActionKind,
    ) -> Result<Allowance, TenancyError> {
        match action {
            ActionKind::Generation => {
                let used = self.current_month_usage(org_id).await?;
                Ok(self.limits.evaluate(plan, used, action))
            }
            ActionKind::ProjectCount => self.check_project_allowance(org_id, plan).await,
        }
    }

    /// Standing cap: counts every project the org holds, with no month key.
    pub async fn check_project_allowance(
        &self,
        org_id: Uuid,
        plan: Plan,
    ) -> Result<Allowance, TenancyError> {
        let count = self.projects.count_projects(org_id).await?;
        Ok(self.limits.evaluate(plan, count, ActionKind::ProjectCount))
    }

    /// Unconditional atomic increment of the current month. Returns the new total.
    pub async fn increment_usage(&self, org_id: Uuid, amount: i64) -> Result<i64, TenancyError> {
        self.increment_usage_for_month(org_id, &current_month_key(), amount)
            .await
    }

    pub async fn increment_usage_for_month(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
    ) -> Result<i64, TenancyError> {
        validate_amount(amount)?;
        let total = self.usage.increment_usage(org_id, month, amount).await?;
        debug!(%org_id, month, total, "usage incremented");
        Ok(total)
    }

    /// Atomic "increment if under limit" against the current month. FREE orgs
    /// at their cap get `QuotaExceeded`; PRO orgs always succeed.
    pub async fn try_consume(
        &self,
        org_id: Uuid,
        plan: Plan,
        amount: i64,
    ) -> Result<Reservation, TenancyError> {
        self.try_consume_in_month(org_id, plan, amount, &current_month_key())
            .await
    }

    pub async fn try_consume_in_month(
        &self,
        org_id: Uuid,
        plan: Plan,
        amount: i64,
        month: &str,
    ) -> Result<Reservation, TenancyError> {
        validate_amount(amount)?;
        let action = ActionKind::Generation;

        let used = match self.limits.limit_for(plan, action) {
            None => self.usage.increment_usage(org_id, month, amount).await?,
            Some(limit) => {
                let outcome = self
                    .usage
                    .try_increment_usage(org_id, month, amount, limit)
                    .await?;
                if !outcome.applied {
                    let allowance = self.limits.evaluate(plan, outcome.generations, action);
                    debug!(%org_id, month, used = outcome.generations, "generation quota exhausted");
                    return Err(TenancyError::QuotaExceeded {
                        action,
                        limit,
                        remaining: remaining_count(allowance.remaining),
                    });
                }
                outcome.generations
            }
        };

        Ok(Reservation {
            org_id,
            month: month.to_string(),
            amount,
            allowance: self.limits.evaluate(plan, used, action),
        })
    }

    /// Returns a reservation after the metered action failed.
    pub async fn release_usage(&self, reservation: &Reservation) -> Result<(), TenancyError> {
        if let Err(err) = self
            .usage
            .release_usage(reservation.org_id, &reservation.month, reservation.amount)
            .await
        {
            warn!(?err, org_id = %reservation.org_id, "failed to release usage reservation");
            return Err(err.into());
        }
        Ok(())
    }
}

fn validate_amount(amount: i64) -> Result<(), TenancyError> {
    if amount < 1 {
        return Err(TenancyError::InvalidInput(format!(
            "usage amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn remaining_count(remaining: Remaining) -> i64 {
    match remaining {
        Remaining::Limited(n) => n,
        Remaining::Unlimited => i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::db::mock_db::InMemoryTenantRepository;

    fn ledger(repo: &Arc<InMemoryTenantRepository>) -> UsageLedger {
        UsageLedger::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            PlanLimits::default(),
        )
    }

    #[test]
    fn month_key_is_utc_and_zero_padded() {
        assert_eq!(month_key(datetime!(2025-03-09 12:00 UTC)), "2025-03");
        assert_eq!(month_key(datetime!(2025-12-31 23:59 UTC)), "2025-12");
        // 23:30 at -05:00 is already the next month in UTC.
        assert_eq!(month_key(datetime!(2025-01-31 23:30 -05:00)), "2025-02");
    }

    #[tokio::test]
    async fn sequential_increments_are_monotonic() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let ledger = ledger(&repo);
        let org = Uuid::new_v4();

        let mut totals = Vec::new();
        for _ in 0..5 {
            totals.push(ledger.increment_usage(org, 1).await.unwrap());
        }

        assert_eq!(totals, vec![1, 2, 3, 4, 5]);
        assert_eq!(ledger.current_month_usage(org).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn new_month_starts_from_zero() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let ledger = ledger(&repo);
        let org = Uuid::new_v4();

        for _ in 0..5 {
            ledger
                .increment_usage_for_month(org, "2025-01", 1)
                .await
                .unwrap();
        }
        let next = ledger
            .increment_usage_for_month(org, "2025-02", 1)
            .await
            .unwrap();

        assert_eq!(next, 1);
        assert_eq!(ledger.usage_for_month(org, "2025-01").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let err = ledger(&repo)
            .increment_usage(Uuid::new_v4(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn check_allowance_reads_plan_and_usage() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let ledger = ledger(&repo);
        let org = Uuid::new_v4();
        repo.set_usage(org, &current_month_key(), 9);

        let allowance = ledger
            .check_allowance(org, ActionKind::Generation)
            .await
            .unwrap();
        assert!(allowance.allowed);
        assert_eq!(allowance.remaining, Remaining::Limited(1));

        repo.set_usage(org, &current_month_key(), 10);
        let allowance = ledger
            .check_allowance(org, ActionKind::Generation)
            .await
            .unwrap();
        assert!(!allowance.allowed);
        assert_eq!(allowance.remaining, Remaining::Limited(0));
    }

    #[tokio::test]
    async fn try_consume_stops_at_limit_for_free() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let ledger = ledger(&repo);
        let org = Uuid::new_v4();
        repo.set_usage(org, "2025-05", 9);

        let reservation = ledger
            .try_consume_in_month(org, Plan::Free, 1, "2025-05")
            .await
            .unwrap();
        assert_eq!(reservation.allowance.used, 10);
        assert_eq!(reservation.allowance.remaining, Remaining::Limited(0));

        let err = ledger
            .try_consume_in_month(org, Plan::Free, 1, "2025-05")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TenancyError::QuotaExceeded {
                action: ActionKind::Generation,
                limit: 10,
                remaining: 0
            }
        ));
        assert_eq!(ledger.usage_for_month(org, "2025-05").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn try_consume_is_unlimited_for_pro() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let ledger = ledger(&repo);
        let org = Uuid::new_v4();
        repo.set_usage(org, "2025-05", 50);

        let reservation = ledger
            .try_consume_in_month(org, Plan::Pro, 1, "2025-05")
            .await
            .unwrap();
        assert_eq!(reservation.allowance.remaining, Remaining::Unlimited);
        assert_eq!(reservation.allowance.used, 51);
    }

    #[tokio::test]
    async fn release_returns_reserved_quota() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let ledger = ledger(&repo);
        let org = Uuid::new_v4();

        let reservation = ledger
            .try_consume_in_month(org, Plan::Free, 1, "2025-06")
            .await
            .unwrap();
        ledger.release_usage(&reservation).await.unwrap();

        assert_eq!(ledger.usage_for_month(org, "2025-06").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_never_overshoot() {
        let repo = Arc::new(InMemoryTenantRepository::new());
        let ledger = ledger(&repo);
        let org = Uuid::new_v4();
        repo.set_usage(org, "2025-07", 9);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .try_consume_in_month(org, Plan::Free, 1, "2025-07")
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(ledger.usage_for_month(org, "2025-07").await.unwrap(), 10);
    }
}
