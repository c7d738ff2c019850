//! Data access for the pipeline.
//!
//! Each store surface the pipeline touches is a trait, so services stay
//! testable against in-memory fakes while production wires the sqlx
//! implementations below.

pub mod asset_repository;
pub mod control_repository;
pub mod delivery_repository;
pub mod subscription_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use asset_repository::AssetRepository;
pub use control_repository::ControlRepository;
pub use delivery_repository::DeliveryRepository;
pub use subscription_repository::SubscriptionRepository;
pub use user_repository::UserRepository;

use crate::error::AppResult;
use crate::models::{
    Asset, DeliveryRecord, DeliveryStatus, MarketTick, NotificationLog, RunSummary, Subscription,
    User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Durable record of tracked assets and their ATH ratchet.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Snapshot of every tracked asset.
    async fn all(&self) -> AppResult<Vec<Asset>>;

    /// Refresh price/rank for one asset. Creates the record on first
    /// ingestion with `ath = current_price` (no event fires for it).
    async fn upsert_price(&self, tick: &MarketTick, now: DateTime<Utc>) -> AppResult<()>;

    /// Advance the ATH ratchet with a compare-and-set keyed on the
    /// previously observed ATH. Returns false when another writer got
    /// there first; the caller must not emit an event in that case.
    async fn record_ath(
        &self,
        tick: &MarketTick,
        previous_ath: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// User records; the pipeline only ever writes the derived
/// `notifications_enabled` flag.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn all(&self) -> AppResult<Vec<User>>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Users with `notifications_enabled = true`.
    async fn notification_candidates(&self) -> AppResult<Vec<User>>;
    async fn set_notifications_enabled(&self, id: Uuid, enabled: bool) -> AppResult<()>;
}

/// Subscription records, read-only to the core.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The user's most recent subscription, if any.
    async fn find_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;
}

/// Notification log + per-recipient delivery records.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Idempotent upsert keyed by event key; returns the canonical log
    /// id whether the row was created now or by an earlier attempt.
    async fn upsert_log(&self, log: &NotificationLog) -> AppResult<Uuid>;
    async fn finalize_recipient_count(&self, log_id: Uuid, count: i32) -> AppResult<()>;
    async fn insert_delivery(&self, record: &DeliveryRecord) -> AppResult<()>;
    /// Accepts asynchronous provider callbacks (delivered/bounced).
    async fn mark_resolved(
        &self,
        delivery_id: Uuid,
        status: DeliveryStatus,
        error_detail: Option<String>,
    ) -> AppResult<()>;
    async fn deliveries_for_log(&self, log_id: Uuid) -> AppResult<Vec<DeliveryRecord>>;
}

/// Expiring keys (single-flight lock, per-asset cooldowns) plus the
/// single-row last-run status record.
#[async_trait]
pub trait ControlStore: Send + Sync {
    /// Atomically claim `key` for the holder named by `token` unless an
    /// unexpired claim exists.
    async fn try_acquire_lock(&self, key: &str, token: &str, ttl: Duration) -> AppResult<bool>;
    /// Release `key` only if `token` still holds it, so a run that
    /// outlived its TTL cannot delete a successor's live claim.
    async fn release_lock(&self, key: &str, token: &str) -> AppResult<()>;
    /// Set/refresh a cooldown key with expiry in one atomic write.
    async fn set_cooldown(&self, key: &str, ttl: Duration) -> AppResult<()>;
    async fn in_cooldown(&self, key: &str) -> AppResult<bool>;
    async fn record_last_run(&self, summary: &RunSummary) -> AppResult<()>;
    async fn last_run(&self) -> AppResult<Option<RunSummary>>;
}

pub type SharedAssetStore = Arc<dyn AssetStore>;
pub type SharedUserStore = Arc<dyn UserStore>;
pub type SharedSubscriptionStore = Arc<dyn SubscriptionStore>;
pub type SharedDeliveryLedger = Arc<dyn DeliveryLedger>;
pub type SharedControlStore = Arc<dyn ControlStore>;
