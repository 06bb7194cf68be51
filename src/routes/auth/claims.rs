use serde::{Deserialize, Serialize};

use crate::models::user::Principal;

/// Claims asserted by the identity provider.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Claims {
    /// Stable external principal id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal {
            external_id: self.sub.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
        }
    }
}
