use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::subscription::Plan;

pub const DEFAULT_FREE_MONTHLY_GENERATIONS: i64 = 10;
pub const DEFAULT_FREE_PROJECT_LIMIT: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Monthly counter kept in `usage_records`.
    Generation,
    /// Standing cap on the number of projects an org holds.
    ProjectCount,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Generation => "generation",
            ActionKind::ProjectCount => "project",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes as a number, or `null` for unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Remaining {
    Limited(i64),
    Unlimited,
}

impl Remaining {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Remaining::Unlimited)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub allowed: bool,
    pub used: i64,
    /// `None` when the plan is uncapped for this action.
    pub limit: Option<i64>,
    pub remaining: Remaining,
}

/// FREE-tier caps. PRO is uncapped for every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub free_monthly_generations: i64,
    pub free_project_limit: i64,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            free_monthly_generations: DEFAULT_FREE_MONTHLY_GENERATIONS,
            free_project_limit: DEFAULT_FREE_PROJECT_LIMIT,
        }
    }
}

impl PlanLimits {
    pub fn limit_for(&self, plan: Plan, action: ActionKind) -> Option<i64> {
        match (plan, action) {
            (Plan::Pro, _) => None,
            (Plan::Free, ActionKind::Generation) => Some(self.free_monthly_generations),
            (Plan::Free, ActionKind::ProjectCount) => Some(self.free_project_limit),
        }
    }

    pub fn evaluate(&self, plan: Plan, used: i64, action: ActionKind) -> Allowance {
        match self.limit_for(plan, action) {
            None => Allowance {
                allowed: true,
                used,
                limit: None,
                remaining: Remaining::Unlimited,
            },
            Some(limit) => Allowance {
                allowed: used < limit,
                used,
                limit: Some(limit),
                remaining: Remaining::Limited((limit - used).max(0)),
            },
        }
    }
}

/// Evaluates against the default caps.
pub fn evaluate(plan: Plan, used: i64, action: ActionKind) -> Allowance {
    PlanLimits::default().evaluate(plan, used, action)
}
