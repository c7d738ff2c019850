//! Domain models for the Athwatch backend.
//!
//! This module contains the typed records flowing through the ATH
//! detection and notification pipeline, validated at the store boundary.

pub mod asset;
pub mod notification;
pub mod run;
pub mod subscription;
pub mod user;

// Re-export all models for convenient access
pub use asset::{Asset, MarketTick};
pub use notification::{AthEvent, DeliveryRecord, DeliveryStatus, NotificationLog};
pub use run::RunSummary;
pub use subscription::{Subscription, SubscriptionStatus};
pub use user::{User, UserRole};
