use crate::error::AppResult;
use crate::models::{AthEvent, User};
use crate::repositories::{SharedControlStore, SharedSubscriptionStore, SharedUserStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooldown key for an asset. Suppression is asset-global: once any
/// notification fires for an asset, every user is suppressed for the
/// window, which guards against re-alerting on price jitter.
pub fn cooldown_key(asset_id: &str) -> String {
    format!("ath:cooldown:{}", asset_id)
}

/// Before/after counts from a preference reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub examined: u32,
    pub enabled: u32,
    pub disabled: u32,
    pub unchanged: u32,
}

/// Computes the recipient set for an ATH event and maintains the
/// derived `notifications_enabled` flag.
pub struct EligibilityResolver {
    users: SharedUserStore,
    subscriptions: SharedSubscriptionStore,
    control: SharedControlStore,
    cooldown: Duration,
}

impl EligibilityResolver {
    pub fn new(
        users: SharedUserStore,
        subscriptions: SharedSubscriptionStore,
        control: SharedControlStore,
        cooldown: Duration,
    ) -> Self {
        Self {
            users,
            subscriptions,
            control,
            cooldown,
        }
    }

    /// Recipient set for one event: notifications enabled, active
    /// unexpired subscription, ordinary role, asset not in cooldown.
    ///
    /// On a non-empty result the cooldown is set before returning, so a
    /// concurrent or immediately retried run cannot double-fire.
    pub async fn resolve(&self, event: &AthEvent) -> AppResult<Vec<User>> {
        let key = cooldown_key(&event.asset_id);

        match self.control.in_cooldown(&key).await {
            Ok(true) => {
                info!("{} notified recently, suppressing for this run", event.asset_id);
                return Ok(Vec::new());
            }
            Ok(false) => {}
            Err(e) => {
                // Conservative: without the counter we cannot rule out a
                // recent send, so skip this asset rather than fail the run.
                warn!("Cooldown check unavailable for {}: {}", event.asset_id, e);
                return Ok(Vec::new());
            }
        }

        let now = Utc::now();
        let mut recipients = Vec::new();
        for user in self.users.notification_candidates().await? {
            if user.is_admin() {
                continue;
            }
            let active = self
                .subscriptions
                .find_for_user(user.id)
                .await?
                .map(|s| s.is_active(now))
                .unwrap_or(false);
            if active {
                recipients.push(user);
            }
        }

        if !recipients.is_empty() {
            self.control.set_cooldown(&key, self.cooldown).await?;
        }

        debug!(
            "{} eligible recipient(s) for {} ATH",
            recipients.len(),
            event.asset_id
        );
        Ok(recipients)
    }

    /// Re-derive every user's `notifications_enabled` flag from current
    /// entitlement: ordinary role, explicit opt-in, active subscription.
    /// Subscription state changes without the user touching their
    /// toggle, so the flag is recomputed rather than trusted.
    pub async fn reconcile_preferences(&self) -> AppResult<ReconcileReport> {
        let now = Utc::now();
        let mut report = ReconcileReport {
            examined: 0,
            enabled: 0,
            disabled: 0,
            unchanged: 0,
        };

        for user in self.users.all().await? {
            report.examined += 1;

            let active = self
                .subscriptions
                .find_for_user(user.id)
                .await?
                .map(|s| s.is_active(now))
                .unwrap_or(false);
            let should = !user.is_admin() && user.notifications_opt_in && active;

            if should == user.notifications_enabled {
                report.unchanged += 1;
                continue;
            }

            self.users.set_notifications_enabled(user.id, should).await?;
            if should {
                report.enabled += 1;
            } else {
                report.disabled += 1;
            }
        }

        info!(
            "Preference reconciliation: {} examined, {} enabled, {} disabled",
            report.examined, report.enabled, report.disabled
        );
        Ok(report)
    }
}
