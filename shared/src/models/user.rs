//! User account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account on the platform. Farmers place orders; admins run the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Stored lower-cased; unique
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub tel_number: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub admin_verified: bool,
    /// Hash of the single live refresh token; overwritten on every login and
    /// rotation
    #[serde(skip_serializing, default)]
    pub refresh_token_hash: Option<String>,
    /// Refresh tokens issued at or before this instant are rejected
    #[serde(skip_serializing, default)]
    pub tokens_revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub verify_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub verify_token_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub forgot_password_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub forgot_password_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Account role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Farmer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Farmer => "farmer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "farmer" => Some(Role::Farmer),
            _ => None,
        }
    }
}

/// Kinds of account email sent by the session manager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountEmailKind {
    Verify,
    Reset,
}

impl AccountEmailKind {
    pub fn subject(&self) -> &'static str {
        match self {
            AccountEmailKind::Verify => "Verify Your Email",
            AccountEmailKind::Reset => "Reset Your Password",
        }
    }

    /// Front-end route the emailed link points at
    pub fn link_path(&self) -> &'static str {
        match self {
            AccountEmailKind::Verify => "verify",
            AccountEmailKind::Reset => "resetpwd",
        }
    }
}
