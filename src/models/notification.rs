use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A detected new all-time high, produced by the comparator during one
/// pipeline run. Derived data; its durable trace is the notification
/// log entry plus per-recipient delivery records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthEvent {
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub previous_ath: Decimal,
    pub new_ath: Decimal,
    pub percentage_increase: f64,
    pub detected_at: DateTime<Utc>,
}

impl AthEvent {
    pub fn new(
        asset_id: String,
        symbol: String,
        name: String,
        previous_ath: Decimal,
        new_ath: Decimal,
        detected_at: DateTime<Utc>,
    ) -> Self {
        let percentage_increase = percentage_increase(previous_ath, new_ath);
        Self {
            asset_id,
            symbol,
            name,
            previous_ath,
            new_ath,
            percentage_increase,
            detected_at,
        }
    }

    /// Stable key for idempotent log upserts: one log row per
    /// (asset, high-water mark) regardless of how often dispatch runs.
    pub fn event_key(&self) -> String {
        format!("{}:{}", self.asset_id, self.new_ath.normalize())
    }
}

/// Percentage gain of `new` over `previous`; 0.0 when the previous
/// value is not positive (first ever price for an asset).
pub fn percentage_increase(previous: Decimal, new: Decimal) -> f64 {
    if previous <= Decimal::ZERO {
        return 0.0;
    }
    let ratio = (new / previous).to_f64().unwrap_or(1.0);
    (ratio - 1.0) * 100.0
}

/// Delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
    Bounced,
}

impl DeliveryStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "bounced" => Ok(DeliveryStatus::Bounced),
            _ => Err(format!("Invalid delivery status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Bounced => "bounced",
        }
    }
}

/// One row per ATH event, recording the event itself. `recipient_count`
/// is finalized once after dispatch completes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationLog {
    pub id: Uuid,
    pub event_key: String,
    pub asset_id: String,
    pub new_ath: Decimal,
    pub previous_ath: Decimal,
    pub sent_at: DateTime<Utc>,
    pub recipient_count: i32,
}

impl NotificationLog {
    pub fn for_event(event: &AthEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_key: event.event_key(),
            asset_id: event.asset_id.clone(),
            new_ath: event.new_ath,
            previous_ath: event.previous_ath,
            sent_at: event.detected_at,
            recipient_count: 0,
        }
    }
}

/// One row per (event, recipient) dispatch attempt, updated in place as
/// delivery status resolves asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryRecord {
    pub id: Uuid,
    /// Absent for admin test sends, which bypass the event log
    pub log_id: Option<Uuid>,
    pub user_id: Uuid,
    pub recipient_email: String,
    pub message_type: String,
    pub status: String, // Stored as TEXT, use DeliveryStatus enum for type safety
    pub provider_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
}

impl DeliveryRecord {
    pub fn sent(
        log_id: Option<Uuid>,
        user_id: Uuid,
        recipient_email: String,
        message_type: &str,
        provider_message_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            log_id,
            user_id,
            recipient_email,
            message_type: message_type.to_string(),
            status: DeliveryStatus::Sent.as_str().to_string(),
            provider_message_id: Some(provider_message_id),
            sent_at: Utc::now(),
            resolved_at: None,
            error_detail: None,
        }
    }

    pub fn failed(
        log_id: Option<Uuid>,
        user_id: Uuid,
        recipient_email: String,
        message_type: &str,
        error_detail: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            log_id,
            user_id,
            recipient_email,
            message_type: message_type.to_string(),
            status: DeliveryStatus::Failed.as_str().to_string(),
            provider_message_id: None,
            sent_at: Utc::now(),
            resolved_at: None,
            error_detail: Some(error_detail),
        }
    }

    /// Get status as an enum
    pub fn status_enum(&self) -> DeliveryStatus {
        DeliveryStatus::from_str(&self.status).unwrap_or(DeliveryStatus::Failed)
    }
}
