use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "proposal_status")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum ProposalStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Proposal {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub version: i32,
    pub status: ProposalStatus,
    pub sections: Value,
    pub public_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields a member may change on an existing proposal. `None` leaves the
/// column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalUpdate {
    pub sections: Option<Value>,
    pub status: Option<ProposalStatus>,
}

/// Read-only view served to anyone holding the public token.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PublicProposal {
    pub project_title: String,
    pub version: i32,
    pub status: ProposalStatus,
    pub sections: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
