//! Identity model: roles, request actors and populated user references
//!
//! Authentication happens upstream. The record engines only ever see an
//! [`Actor`] and branch on its role or compare its display identity to
//! record fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Closed set of user roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Super Admin")]
    SuperAdmin,
    #[serde(rename = "Admin")]
    Admin,
    #[serde(rename = "Verifier")]
    Verifier,
    #[serde(rename = "Collector")]
    Collector,
    #[serde(rename = "Payment Redeemer")]
    PaymentRedeemer,
    #[serde(rename = "Payment Poster")]
    PaymentPoster,
    #[serde(rename = "Hearing Representative")]
    HearingRepresentative,
    #[serde(rename = "Provider")]
    Provider,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Verifier,
        Role::Collector,
        Role::PaymentRedeemer,
        Role::PaymentPoster,
        Role::HearingRepresentative,
        Role::Provider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "Super Admin",
            Role::Admin => "Admin",
            Role::Verifier => "Verifier",
            Role::Collector => "Collector",
            Role::PaymentRedeemer => "Payment Redeemer",
            Role::PaymentPoster => "Payment Poster",
            Role::HearingRepresentative => "Hearing Representative",
            Role::Provider => "Provider",
        }
    }

    /// Admin or Super Admin
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    /// Accepts the display string or its snake_case spelling, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', " ");
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().to_lowercase() == wanted)
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown role: {}", s)))
    }
}

/// The resolved identity performing a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub username: String,
    pub full_name: Option<String>,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role, username: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            username: username.into(),
            full_name: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Name used for provider matching: trimmed full name, else username
    pub fn display_identity(&self) -> String {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.username.trim())
            .to_string()
    }
}

/// Stored user (credentials live with the auth collaborator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
}

impl User {
    pub fn to_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: Some(self.username.clone()),
            full_name: Some(self.full_name.clone()),
        }
    }

    pub fn as_actor(&self) -> Actor {
        Actor::new(self.id, self.role, self.username.clone()).with_full_name(self.full_name.clone())
    }
}

/// Populated reference to a user, as embedded in record responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

impl UserRef {
    /// Reference whose user row could not be resolved
    pub fn bare(id: Uuid) -> Self {
        Self {
            id,
            username: None,
            full_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_display_and_snake_case() {
        assert_eq!("Payment Redeemer".parse::<Role>().unwrap(), Role::PaymentRedeemer);
        assert_eq!("payment_redeemer".parse::<Role>().unwrap(), Role::PaymentRedeemer);
        assert_eq!(" super admin ".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_uses_display_strings() {
        let json = serde_json::to_string(&Role::HearingRepresentative).unwrap();
        assert_eq!(json, "\"Hearing Representative\"");
    }

    #[test]
    fn test_display_identity_prefers_full_name() {
        let actor = Actor::new(Uuid::new_v4(), Role::Provider, "acme").with_full_name("  Acme Clinic ");
        assert_eq!(actor.display_identity(), "Acme Clinic");

        let blank = Actor::new(Uuid::new_v4(), Role::Provider, " acme ").with_full_name("   ");
        assert_eq!(blank.display_identity(), "acme");
    }
}
