use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Blocked,
}

impl SubscriptionStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "blocked" => Ok(SubscriptionStatus::Blocked),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Blocked => "blocked",
        }
    }
}

/// Subscription record, read-only to the pipeline core.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String, // Stored as TEXT, use SubscriptionStatus enum for type safety
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub amount: Decimal,
}

impl Subscription {
    /// Get status as an enum
    pub fn status_enum(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.status).unwrap_or(SubscriptionStatus::Pending)
    }

    /// Active and unexpired as of `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status_enum() == SubscriptionStatus::Active && now <= self.ends_at
    }
}
