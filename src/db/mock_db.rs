use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::health::DatabaseHealth;
use crate::db::organization_repository::OrganizationRepository;
use crate::db::project_repository::{CreateProjectOutcome, ProjectRepository};
use crate::db::proposal_repository::ProposalRepository;
use crate::db::subscription_repository::{SubscriptionRepository, UpgradeOutcome};
use crate::db::usage_repository::UsageRepository;
use crate::db::user_repository::UserRepository;
use crate::models::organization::{
    ActiveMembership, MemberSummary, Membership, MembershipRole, Organization, ProvisionedTenant,
};
use crate::models::project::{NewProject, Project, ProjectUpdate};
use crate::models::proposal::{Proposal, ProposalStatus, ProposalUpdate, PublicProposal};
use crate::models::subscription::{Plan, Subscription, SubscriptionUpgrade};
use crate::models::usage::UsageIncrement;
use crate::models::user::{User, UNKNOWN_EMAIL};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    organizations: Vec<Organization>,
    // Insertion order doubles as creation order.
    memberships: Vec<Membership>,
    subscriptions: HashMap<Uuid, Subscription>,
    usage: HashMap<(Uuid, String), i64>,
    stripe_events: Vec<String>,
    projects: Vec<Project>,
    proposals: Vec<Proposal>,
}

/// Single-lock stand-in for Postgres. Every trait call holds the lock for its
/// whole body, which gives the same atomicity the SQL statements provide.
#[derive(Default)]
pub struct InMemoryTenantRepository {
    tables: Mutex<Tables>,
    /// Makes every write return `sqlx::Error::PoolTimedOut`.
    pub fail_writes: AtomicBool,
    pub provision_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_writable(&self) -> Result<(), sqlx::Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }

    pub fn organization_count(&self) -> usize {
        self.tables.lock().unwrap().organizations.len()
    }

    pub fn membership_count_for(&self, user_id: Uuid) -> usize {
        self.tables
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .count()
    }

    pub fn subscription_count(&self) -> usize {
        self.tables.lock().unwrap().subscriptions.len()
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn subscription(&self, org_id: Uuid) -> Option<Subscription> {
        self.tables.lock().unwrap().subscriptions.get(&org_id).cloned()
    }

    pub fn recorded_events(&self) -> Vec<String> {
        self.tables.lock().unwrap().stripe_events.clone()
    }

    pub fn set_usage(&self, org_id: Uuid, month: &str, generations: i64) {
        self.tables
            .lock()
            .unwrap()
            .usage
            .insert((org_id, month.to_string()), generations);
    }

    pub fn set_plan(&self, org_id: Uuid, plan: Plan) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(subscription) = tables.subscriptions.get_mut(&org_id) {
            subscription.plan = plan;
        }
    }
}

fn active_membership(tables: &Tables, user_id: Uuid) -> Option<ActiveMembership> {
    let membership = tables
        .memberships
        .iter()
        .find(|m| m.user_id == user_id)?
        .clone();
    let organization = tables
        .organizations
        .iter()
        .find(|o| o.id == membership.org_id)?
        .clone();
    let subscription = tables.subscriptions.get(&organization.id).cloned();

    Some(ActiveMembership {
        membership,
        organization,
        subscription,
    })
}

fn free_subscription(org_id: Uuid) -> Subscription {
    Subscription {
        org_id,
        plan: Plan::Free,
        stripe_customer_id: None,
        stripe_subscription_id: None,
        current_period_end: None,
        updated_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl UserRepository for InMemoryTenantRepository {
    async fn upsert_user(
        &self,
        external_id: &str,
        email_hint: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(user) = tables
            .users
            .iter_mut()
            .find(|u| u.external_id == external_id)
        {
            if let Some(email) = email_hint {
                user.email = email.to_string();
            }
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            email: email_hint.unwrap_or(UNKNOWN_EMAIL).to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryTenantRepository {
    async fn find_active_membership(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ActiveMembership>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(active_membership(&tables, user_id))
    }

    async fn provision_tenant(
        &self,
        user_id: Uuid,
        org_name: &str,
    ) -> Result<ProvisionedTenant, sqlx::Error> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();

        if let Some(existing) = active_membership(&tables, user_id) {
            let org_id = existing.organization.id;
            let subscription = tables
                .subscriptions
                .entry(org_id)
                .or_insert_with(|| free_subscription(org_id))
                .clone();
            return Ok(ProvisionedTenant {
                organization: existing.organization,
                membership: existing.membership,
                subscription,
                created: false,
            });
        }

        let now = OffsetDateTime::now_utc();
        let organization = Organization {
            id: Uuid::new_v4(),
            name: org_name.to_string(),
            created_at: now,
        };
        let subscription = free_subscription(organization.id);
        let membership = Membership {
            id: Uuid::new_v4(),
            org_id: organization.id,
            user_id,
            role: MembershipRole::Owner,
            created_at: now,
        };

        tables.organizations.push(organization.clone());
        tables
            .subscriptions
            .insert(organization.id, subscription.clone());
        tables.memberships.push(membership.clone());

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
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .memberships
            .iter()
            .find(|m| m.org_id == org_id && m.user_id == user_id)
            .cloned())
    }

    async fn add_member(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
    ) -> Result<bool, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .memberships
            .iter()
            .any(|m| m.org_id == org_id && m.user_id == user_id)
        {
            return Ok(false);
        }
        tables.memberships.push(Membership {
            id: Uuid::new_v4(),
            org_id,
            user_id,
            role,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(true)
    }

    async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberSummary>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.org_id == org_id)
            .filter_map(|m| {
                tables
                    .users
                    .iter()
                    .find(|u| u.id == m.user_id)
                    .map(|u| MemberSummary {
                        user_id: u.id,
                        email: u.email.clone(),
                        role: m.role,
                    })
            })
            .collect())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryTenantRepository {
    async fn get_subscription(&self, org_id: Uuid) -> Result<Option<Subscription>, sqlx::Error> {
        Ok(self.subscription(org_id))
    }

    async fn upgrade_subscription(
        &self,
        upgrade: &SubscriptionUpgrade,
        event_id: &str,
    ) -> Result<UpgradeOutcome, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if !tables.organizations.iter().any(|o| o.id == upgrade.org_id) {
            return Ok(UpgradeOutcome::UnknownOrganization);
        }

        let replay = tables.stripe_events.iter().any(|id| id == event_id);
        if !replay {
            tables.stripe_events.push(event_id.to_string());
        }

        let subscription = tables
            .subscriptions
            .entry(upgrade.org_id)
            .or_insert_with(|| free_subscription(upgrade.org_id));
        subscription.plan = Plan::Pro;
        if let Some(customer) = &upgrade.stripe_customer_id {
            subscription.stripe_customer_id = Some(customer.clone());
        }
        if let Some(sub_id) = &upgrade.stripe_subscription_id {
            subscription.stripe_subscription_id = Some(sub_id.clone());
        }
        subscription.updated_at = OffsetDateTime::now_utc();

        Ok(UpgradeOutcome::Applied {
            subscription: subscription.clone(),
            replay,
        })
    }

    async fn set_current_period_end(
        &self,
        org_id: Uuid,
        period_end: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(subscription) = tables.subscriptions.get_mut(&org_id) {
            subscription.current_period_end = Some(period_end);
        }
        Ok(())
    }
}

#[async_trait]
impl UsageRepository for InMemoryTenantRepository {
    async fn get_usage(&self, org_id: Uuid, month: &str) -> Result<i64, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .usage
            .get(&(org_id, month.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn increment_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
    ) -> Result<i64, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.usage.entry((org_id, month.to_string())).or_insert(0);
        *entry += amount;
        Ok(*entry)
    }

    async fn try_increment_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
        limit: i64,
    ) -> Result<UsageIncrement, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let key = (org_id, month.to_string());
        let current = tables.usage.get(&key).copied().unwrap_or(0);
        if current + amount > limit {
            return Ok(UsageIncrement {
                applied: false,
                generations: current,
            });
        }
        tables.usage.insert(key, current + amount);
        Ok(UsageIncrement {
            applied: true,
            generations: current + amount,
        })
    }

    async fn release_usage(
        &self,
        org_id: Uuid,
        month: &str,
        amount: i64,
    ) -> Result<(), sqlx::Error> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(entry) = tables.usage.get_mut(&(org_id, month.to_string())) {
            *entry = (*entry - amount).max(0);
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for InMemoryTenantRepository {
    async fn count_projects(&self, org_id: Uuid) -> Result<i64, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.projects.iter().filter(|p| p.org_id == org_id).count() as i64)
    }

    async fn create_project(
        &self,
        project: &NewProject,
        limit: Option<i64>,
    ) -> Result<CreateProjectOutcome, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let current = tables
            .projects
            .iter()
            .filter(|p| p.org_id == project.org_id)
            .count() as i64;
        if let Some(limit) = limit {
            if current >= limit {
                return Ok(CreateProjectOutcome::LimitReached { current });
            }
        }

        let now = OffsetDateTime::now_utc();
        let created = Project {
            id: Uuid::new_v4(),
            org_id: project.org_id,
            owner_id: project.owner_id,
            client_id: project.client_id,
            title: project.title.clone(),
            status: project.status.clone(),
            estimated_value: project.estimated_value,
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(created.clone());
        Ok(CreateProjectOutcome::Created(created))
    }

    async fn list_projects(&self, org_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .projects
            .iter()
            .rev()
            .filter(|p| p.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn find_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .projects
            .iter()
            .find(|p| p.org_id == org_id && p.id == project_id)
            .cloned())
    }

    async fn update_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        update: &ProjectUpdate,
    ) -> Result<Option<Project>, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(project) = tables
            .projects
            .iter_mut()
            .find(|p| p.org_id == org_id && p.id == project_id)
        else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            project.title = title.clone();
        }
        if let Some(status) = &update.status {
            project.status = status.clone();
        }
        if let Some(value) = update.estimated_value {
            project.estimated_value = Some(value);
        }
        project.updated_at = OffsetDateTime::now_utc();
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, org_id: Uuid, project_id: Uuid) -> Result<bool, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.projects.len();
        tables
            .projects
            .retain(|p| !(p.org_id == org_id && p.id == project_id));
        let removed = tables.projects.len() != before;
        if removed {
            tables.proposals.retain(|p| p.project_id != project_id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ProposalRepository for InMemoryTenantRepository {
    async fn create_proposal(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        sections: &Value,
    ) -> Result<Proposal, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if !tables
            .projects
            .iter()
            .any(|p| p.org_id == org_id && p.id == project_id)
        {
            return Err(sqlx::Error::RowNotFound);
        }
        let version = tables
            .proposals
            .iter()
            .filter(|p| p.project_id == project_id)
            .map(|p| p.version)
            .max()
            .unwrap_or(0)
            + 1;
        let proposal = Proposal {
            id: Uuid::new_v4(),
            org_id,
            project_id,
            version,
            status: ProposalStatus::Draft,
            sections: sections.clone(),
            public_token: None,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn list_proposals(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Proposal>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let mut proposals: Vec<Proposal> = tables
            .proposals
            .iter()
            .filter(|p| p.org_id == org_id && p.project_id == project_id)
            .cloned()
            .collect();
        proposals.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(proposals)
    }

    async fn find_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .proposals
            .iter()
            .find(|p| p.org_id == org_id && p.id == proposal_id)
            .cloned())
    }

    async fn find_public_proposal(
        &self,
        token: &str,
    ) -> Result<Option<PublicProposal>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let Some(proposal) = tables
            .proposals
            .iter()
            .find(|p| p.public_token.as_deref() == Some(token))
        else {
            return Ok(None);
        };
        Ok(tables
            .projects
            .iter()
            .find(|p| p.id == proposal.project_id)
            .map(|project| PublicProposal {
                project_title: project.title.clone(),
                version: proposal.version,
                status: proposal.status,
                sections: proposal.sections.clone(),
                created_at: proposal.created_at,
            }))
    }

    async fn update_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
        update: &ProposalUpdate,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(proposal) = tables
            .proposals
            .iter_mut()
            .find(|p| p.org_id == org_id && p.id == proposal_id)
        else {
            return Ok(None);
        };
        if let Some(sections) = &update.sections {
            proposal.sections = sections.clone();
        }
        if let Some(status) = update.status {
            proposal.status = status;
        }
        Ok(Some(proposal.clone()))
    }

    async fn publish_proposal(
        &self,
        org_id: Uuid,
        proposal_id: Uuid,
        token: &str,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(proposal) = tables
            .proposals
            .iter_mut()
            .find(|p| p.org_id == org_id && p.id == proposal_id)
        else {
            return Ok(None);
        };
        if proposal.status == ProposalStatus::Draft {
            proposal.status = ProposalStatus::Sent;
        }
        if proposal.public_token.is_none() {
            proposal.public_token = Some(token.to_string());
        }
        Ok(Some(proposal.clone()))
    }

    async fn delete_proposal(&self, org_id: Uuid, proposal_id: Uuid) -> Result<bool, sqlx::Error> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.proposals.len();
        tables
            .proposals
            .retain(|p| !(p.org_id == org_id && p.id == proposal_id));
        Ok(tables.proposals.len() != before)
    }
}

pub struct MockHealth {
    pub healthy: bool,
}

#[async_trait]
impl DatabaseHealth for MockHealth {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.healthy {
            Ok(())
        } else {
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}
