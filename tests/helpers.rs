//! In-memory fakes for every seam the pipeline touches, plus fixtures.
//!
//! The fakes honor the same contracts as the Postgres repositories
//! (ratchet CAS, idempotent log upsert, expiring control keys) so the
//! pipeline tests exercise real orchestration logic.

#![allow(dead_code)]

use athwatch::config::PipelineConfig;
use athwatch::error::{AppError, AppResult};
use athwatch::models::*;
use athwatch::repositories::*;
use athwatch::services::mailer::{EmailSender, OutboundEmail, SendError};
use athwatch::services::market_data::MarketDataSource;
use athwatch::services::{Comparator, Dispatcher, EligibilityResolver, Pipeline};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

// ---------------------------------------------------------------------
// Asset store

#[derive(Default)]
pub struct MemoryAssets {
    inner: Mutex<HashMap<String, Asset>>,
}

impl MemoryAssets {
    pub fn seed(&self, asset: Asset) {
        self.inner.lock().unwrap().insert(asset.id.clone(), asset);
    }

    pub fn get(&self, id: &str) -> Option<Asset> {
        self.inner.lock().unwrap().get(id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.inner.lock().unwrap().values().cloned().collect();
        assets.sort_by_key(|a| a.market_cap_rank);
        assets
    }
}

#[async_trait]
impl AssetStore for MemoryAssets {
    async fn all(&self) -> AppResult<Vec<Asset>> {
        Ok(self.snapshot())
    }

    async fn upsert_price(&self, tick: &MarketTick, now: DateTime<Utc>) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(&tick.id) {
            Some(asset) => {
                asset.symbol = tick.symbol.clone();
                asset.name = tick.name.clone();
                asset.current_price = tick.current_price;
                asset.market_cap_rank = tick.market_cap_rank;
                asset.last_updated = now;
            }
            None => {
                inner.insert(
                    tick.id.clone(),
                    Asset {
                        id: tick.id.clone(),
                        symbol: tick.symbol.clone(),
                        name: tick.name.clone(),
                        current_price: tick.current_price,
                        market_cap_rank: tick.market_cap_rank,
                        ath: tick.current_price,
                        ath_date: now,
                        last_updated: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn record_ath(
        &self,
        tick: &MarketTick,
        previous_ath: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(&tick.id) {
            Some(asset) if asset.ath == previous_ath => {
                asset.ath = tick.current_price;
                asset.ath_date = at;
                asset.current_price = tick.current_price;
                asset.market_cap_rank = tick.market_cap_rank;
                asset.last_updated = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------
// User + subscription stores

#[derive(Default)]
pub struct MemoryUsers {
    inner: Mutex<Vec<User>>,
}

impl MemoryUsers {
    pub fn seed(&self, user: User) -> Uuid {
        let id = user.id;
        self.inner.lock().unwrap().push(user);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.inner.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn all(&self) -> AppResult<Vec<User>> {
        Ok(self.inner.lock().unwrap().clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.get(id))
    }

    async fn notification_candidates(&self) -> AppResult<Vec<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.notifications_enabled)
            .cloned()
            .collect())
    }

    async fn set_notifications_enabled(&self, id: Uuid, enabled: bool) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.iter_mut().find(|u| u.id == id) {
            user.notifications_enabled = enabled;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySubscriptions {
    inner: Mutex<HashMap<Uuid, Subscription>>,
}

impl MemorySubscriptions {
    pub fn seed(&self, sub: Subscription) {
        self.inner.lock().unwrap().insert(sub.user_id, sub);
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptions {
    async fn find_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.inner.lock().unwrap().get(&user_id).cloned())
    }
}

// ---------------------------------------------------------------------
// Delivery ledger

#[derive(Default)]
pub struct MemoryLedger {
    logs: Mutex<HashMap<String, NotificationLog>>,
    deliveries: Mutex<Vec<DeliveryRecord>>,
}

impl MemoryLedger {
    pub fn logs(&self) -> Vec<NotificationLog> {
        self.logs.lock().unwrap().values().cloned().collect()
    }

    pub fn deliveries(&self) -> Vec<DeliveryRecord> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryLedger for MemoryLedger {
    async fn upsert_log(&self, log: &NotificationLog) -> AppResult<Uuid> {
        let mut logs = self.logs.lock().unwrap();
        if let Some(existing) = logs.get(&log.event_key) {
            return Ok(existing.id);
        }
        logs.insert(log.event_key.clone(), log.clone());
        Ok(log.id)
    }

    async fn finalize_recipient_count(&self, log_id: Uuid, count: i32) -> AppResult<()> {
        let mut logs = self.logs.lock().unwrap();
        if let Some(log) = logs.values_mut().find(|l| l.id == log_id) {
            log.recipient_count = count;
        }
        Ok(())
    }

    async fn insert_delivery(&self, record: &DeliveryRecord) -> AppResult<()> {
        self.deliveries.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn mark_resolved(
        &self,
        delivery_id: Uuid,
        status: DeliveryStatus,
        error_detail: Option<String>,
    ) -> AppResult<()> {
        let mut deliveries = self.deliveries.lock().unwrap();
        if let Some(record) = deliveries.iter_mut().find(|d| d.id == delivery_id) {
            record.status = status.as_str().to_string();
            record.resolved_at = Some(Utc::now());
            if error_detail.is_some() {
                record.error_detail = error_detail;
            }
        }
        Ok(())
    }

    async fn deliveries_for_log(&self, log_id: Uuid) -> AppResult<Vec<DeliveryRecord>> {
        Ok(self
            .deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.log_id == Some(log_id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------
// Control store (locks, cooldowns, last-run row)

#[derive(Default)]
pub struct MemoryControl {
    keys: Mutex<HashMap<String, (String, Instant)>>,
    last: Mutex<Option<RunSummary>>,
    fail_cooldown_checks: Mutex<bool>,
}

impl MemoryControl {
    /// Make every cooldown check fail, simulating a store outage.
    pub fn break_cooldown_checks(&self) {
        *self.fail_cooldown_checks.lock().unwrap() = true;
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, exp)| *exp > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ControlStore for MemoryControl {
    async fn try_acquire_lock(&self, key: &str, token: &str, ttl: Duration) -> AppResult<bool> {
        let mut keys = self.keys.lock().unwrap();
        let now = Instant::now();
        match keys.get(key) {
            Some((_, expires)) if *expires > now => Ok(false),
            _ => {
                keys.insert(key.to_string(), (token.to_string(), now + ttl));
                Ok(true)
            }
        }
    }

    async fn release_lock(&self, key: &str, token: &str) -> AppResult<()> {
        let mut keys = self.keys.lock().unwrap();
        if keys.get(key).map(|(held, _)| held == token).unwrap_or(false) {
            keys.remove(key);
        }
        Ok(())
    }

    async fn set_cooldown(&self, key: &str, ttl: Duration) -> AppResult<()> {
        self.keys
            .lock()
            .unwrap()
            .insert(key.to_string(), (String::new(), Instant::now() + ttl));
        Ok(())
    }

    async fn in_cooldown(&self, key: &str) -> AppResult<bool> {
        if *self.fail_cooldown_checks.lock().unwrap() {
            return Err(AppError::StoreUnavailable("injected outage".to_string()));
        }
        Ok(self.has_key(key))
    }

    async fn record_last_run(&self, summary: &RunSummary) -> AppResult<()> {
        *self.last.lock().unwrap() = Some(summary.clone());
        Ok(())
    }

    async fn last_run(&self) -> AppResult<Option<RunSummary>> {
        Ok(self.last.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------
// Market data source

/// Replays a queue of scripted responses, optionally delaying each to
/// widen race windows in concurrency tests.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<AppResult<Vec<MarketTick>>>>,
    delay: Duration,
}

impl ScriptedSource {
    pub fn new(responses: Vec<AppResult<Vec<MarketTick>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn top_assets(&self, _limit: u32) -> AppResult<Vec<MarketTick>> {
        let next = { self.responses.lock().unwrap().pop_front() };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------
// Email sender

/// Records every accepted send; addresses in the reject set fail with a
/// terminal error.
#[derive(Default)]
pub struct RecordingMailer {
    accepted: Mutex<Vec<OutboundEmail>>,
    rejects: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

impl RecordingMailer {
    pub fn reject(&self, address: &str) {
        self.rejects.lock().unwrap().insert(address.to_string());
    }

    pub fn accepted(&self) -> Vec<OutboundEmail> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<String, SendError> {
        if self.rejects.lock().unwrap().contains(&email.to) {
            return Err(SendError::Terminal("recipient rejected".to_string()));
        }
        self.accepted.lock().unwrap().push(email.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("msg-{}", n))
    }
}

// ---------------------------------------------------------------------
// Fixtures

pub fn tick(id: &str, symbol: &str, name: &str, price: &str, rank: i32) -> MarketTick {
    MarketTick {
        id: id.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        current_price: price.parse().unwrap(),
        market_cap_rank: rank,
    }
}

pub fn asset(id: &str, symbol: &str, name: &str, ath: &str, rank: i32) -> Asset {
    let now = Utc::now();
    let ath: Decimal = ath.parse().unwrap();
    Asset {
        id: id.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        current_price: ath,
        market_cap_rank: rank,
        ath,
        ath_date: now - ChronoDuration::days(90),
        last_updated: now,
    }
}

pub fn user(email: &str, role: &str, opt_in: bool, enabled: bool) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        role: role.to_string(),
        notifications_opt_in: opt_in,
        notifications_enabled: enabled,
        created_at: Utc::now(),
    }
}

pub fn subscription(user_id: Uuid, status: &str, ends_in_days: i64) -> Subscription {
    let now = Utc::now();
    Subscription {
        id: Uuid::new_v4(),
        user_id,
        status: status.to_string(),
        starts_at: now - ChronoDuration::days(30),
        ends_at: now + ChronoDuration::days(ends_in_days),
        amount: Decimal::new(999, 2),
    }
}

// ---------------------------------------------------------------------
// Harness

pub struct Harness {
    pub assets: Arc<MemoryAssets>,
    pub users: Arc<MemoryUsers>,
    pub subscriptions: Arc<MemorySubscriptions>,
    pub ledger: Arc<MemoryLedger>,
    pub control: Arc<MemoryControl>,
    pub mailer: Arc<RecordingMailer>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            assets: Arc::new(MemoryAssets::default()),
            users: Arc::new(MemoryUsers::default()),
            subscriptions: Arc::new(MemorySubscriptions::default()),
            ledger: Arc::new(MemoryLedger::default()),
            control: Arc::new(MemoryControl::default()),
            mailer: Arc::new(RecordingMailer::default()),
        }
    }

    /// Seed an ordinary, opted-in user with an active subscription.
    pub fn eligible_user(&self, email: &str) -> Uuid {
        let id = self.users.seed(user(email, "user", true, true));
        self.subscriptions.seed(subscription(id, "active", 30));
        id
    }

    pub fn resolver(&self, config: &PipelineConfig) -> EligibilityResolver {
        EligibilityResolver::new(
            self.users.clone(),
            self.subscriptions.clone(),
            self.control.clone(),
            config.cooldown(),
        )
    }

    pub fn dispatcher(&self, config: &PipelineConfig) -> Dispatcher {
        Dispatcher::new(
            self.ledger.clone(),
            self.users.clone(),
            self.subscriptions.clone(),
            self.assets.clone(),
            self.mailer.clone(),
            config.dispatch_concurrency,
        )
    }

    pub fn pipeline(&self, source: ScriptedSource) -> Pipeline {
        self.pipeline_with(source, PipelineConfig::default())
    }

    pub fn pipeline_with(&self, source: ScriptedSource, config: PipelineConfig) -> Pipeline {
        Pipeline::new(
            Arc::new(source),
            Comparator::new(self.assets.clone(), config.ath_threshold),
            self.resolver(&config),
            self.dispatcher(&config),
            self.control.clone(),
            config,
            100,
        )
    }
}
