use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

/// User model. Read-only to the pipeline core except for the
/// denormalized `notifications_enabled` flag, which preference
/// reconciliation re-derives from entitlement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String, // Stored as TEXT, use UserRole enum for type safety
    /// The user's own toggle; an opt-in is not an entitlement
    pub notifications_opt_in: bool,
    /// Derived flag the eligibility resolver reads
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Get role as an enum
    pub fn role_enum(&self) -> UserRole {
        UserRole::from_str(&self.role).unwrap_or(UserRole::User)
    }

    /// Check if user holds an administrative role
    pub fn is_admin(&self) -> bool {
        self.role_enum() == UserRole::Admin
    }
}
