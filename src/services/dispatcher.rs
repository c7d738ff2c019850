use crate::error::{AppError, AppResult};
use crate::models::{AthEvent, DeliveryRecord, NotificationLog, User};
use crate::repositories::{
    SharedAssetStore, SharedDeliveryLedger, SharedSubscriptionStore, SharedUserStore,
};
use crate::services::mailer::{render_ath_email, SharedEmailSender};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const ATH_MESSAGE_TYPE: &str = "ath_alert";
pub const TEST_MESSAGE_TYPE: &str = "test";

/// Per-event dispatch totals.
pub struct DispatchOutcome {
    pub log_id: Uuid,
    pub sent: u32,
    pub failed: u32,
}

/// Renders and sends one notification per (event, recipient) pair with
/// bounded concurrency, recording every attempt in the ledger.
pub struct Dispatcher {
    ledger: SharedDeliveryLedger,
    users: SharedUserStore,
    subscriptions: SharedSubscriptionStore,
    assets: SharedAssetStore,
    sender: SharedEmailSender,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        ledger: SharedDeliveryLedger,
        users: SharedUserStore,
        subscriptions: SharedSubscriptionStore,
        assets: SharedAssetStore,
        sender: SharedEmailSender,
        concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            users,
            subscriptions,
            assets,
            sender,
            concurrency,
        }
    }

    /// Dispatch one event to its recipient list.
    ///
    /// Sends are independent: a failed recipient becomes a `failed`
    /// delivery record and the rest proceed. The notification log row
    /// is upserted before any send and its recipient count finalized to
    /// the number of successful sends afterwards.
    pub async fn dispatch(
        &self,
        event: &AthEvent,
        recipients: &[User],
    ) -> AppResult<DispatchOutcome> {
        let log_id = self
            .ledger
            .upsert_log(&NotificationLog::for_event(event))
            .await?;

        let results: Vec<bool> = stream::iter(
            recipients
                .iter()
                .map(|user| self.send_one(event, log_id, user)),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let sent = results.iter().filter(|ok| **ok).count() as u32;
        let failed = results.len() as u32 - sent;

        if let Err(e) = self.ledger.finalize_recipient_count(log_id, sent as i32).await {
            // The log row exists; the count can be re-finalized later.
            warn!("Could not finalize recipient count for {}: {}", log_id, e);
        }

        info!(
            "Dispatched {} ATH alert: {} sent, {} failed",
            event.asset_id, sent, failed
        );
        Ok(DispatchOutcome { log_id, sent, failed })
    }

    async fn send_one(&self, event: &AthEvent, log_id: Uuid, user: &User) -> bool {
        let email = render_ath_email(event, &user.email);

        let record = match self.sender.send(&email).await {
            Ok(provider_id) => DeliveryRecord::sent(
                Some(log_id),
                user.id,
                user.email.clone(),
                ATH_MESSAGE_TYPE,
                provider_id,
            ),
            Err(e) => {
                warn!("Send to {} failed ({}): {}", user.email, event.asset_id, e);
                DeliveryRecord::failed(
                    Some(log_id),
                    user.id,
                    user.email.clone(),
                    ATH_MESSAGE_TYPE,
                    e.to_string(),
                )
            }
        };

        let ok = record.status_enum() == crate::models::DeliveryStatus::Sent;
        if let Err(e) = self.ledger.insert_delivery(&record).await {
            error!("Could not record delivery for {}: {}", user.email, e);
        }
        ok
    }

    /// Admin test send: bypasses eligibility filtering and cooldown but
    /// still requires the target to hold an active subscription.
    pub async fn send_test(&self, user_id: Uuid) -> AppResult<String> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        let active = self
            .subscriptions
            .find_for_user(user.id)
            .await?
            .map(|s| s.is_active(Utc::now()))
            .unwrap_or(false);
        if !active {
            return Err(AppError::Validation(
                "Test notifications require an active subscription".to_string(),
            ));
        }

        // Render against the current top-ranked asset so the message
        // looks like a real alert.
        let asset = self
            .assets
            .all()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Validation("No assets tracked yet".to_string()))?;

        let event = AthEvent::new(
            asset.id.clone(),
            asset.symbol.clone(),
            asset.name.clone(),
            asset.ath,
            asset.ath,
            Utc::now(),
        );
        let email = render_ath_email(&event, &user.email);
        let provider_id = self.sender.send(&email).await.map_err(AppError::from)?;

        self.ledger
            .insert_delivery(&DeliveryRecord::sent(
                None,
                user.id,
                user.email.clone(),
                TEST_MESSAGE_TYPE,
                provider_id.clone(),
            ))
            .await?;

        info!("Test notification sent to {}", user.email);
        Ok(provider_id)
    }
}
