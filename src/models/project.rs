use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PROJECT_STATUS: &str = "LEAD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Option<Uuid>,
    pub title: String,
    pub status: String,
    pub estimated_value: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub org_id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Option<Uuid>,
    pub title: String,
    pub status: String,
    pub estimated_value: Option<f64>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub status: Option<String>,
    pub estimated_value: Option<f64>,
}
