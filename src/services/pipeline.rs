use crate::config::PipelineConfig;
use crate::error::{AppError, AppResult};
use crate::models::RunSummary;
use crate::repositories::SharedControlStore;
use crate::services::comparator::Comparator;
use crate::services::dispatcher::Dispatcher;
use crate::services::eligibility::EligibilityResolver;
use crate::services::market_data::SharedMarketDataSource;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Single-flight lock key shared by every trigger path.
pub const RUN_LOCK_KEY: &str = "pipeline:run";

/// Pipeline run stages, for logging and the run post-mortem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Fetching,
    Comparing,
    Dispatching,
    Completed,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Idle => "idle",
            RunStage::Fetching => "fetching",
            RunStage::Comparing => "comparing",
            RunStage::Dispatching => "dispatching",
            RunStage::Completed => "completed",
            RunStage::Failed => "failed",
        }
    }
}

/// The pipeline entry point invoked by the external trigger.
///
/// Sequences Fetch → Compare → Resolve → Dispatch within one
/// invocation; owns no timers and schedules nothing itself.
pub struct Pipeline {
    source: SharedMarketDataSource,
    comparator: Comparator,
    resolver: EligibilityResolver,
    dispatcher: Dispatcher,
    control: SharedControlStore,
    config: PipelineConfig,
    universe_size: u32,
}

impl Pipeline {
    pub fn new(
        source: SharedMarketDataSource,
        comparator: Comparator,
        resolver: EligibilityResolver,
        dispatcher: Dispatcher,
        control: SharedControlStore,
        config: PipelineConfig,
        universe_size: u32,
    ) -> Self {
        Self {
            source,
            comparator,
            resolver,
            dispatcher,
            control,
            config,
            universe_size,
        }
    }

    /// Execute one run. Overlapping triggers degrade to a safe skip:
    /// whoever loses the single-flight lock gets `AlreadyRunning`.
    /// `force` bypasses the lock for diagnostics.
    pub async fn run(&self, force: bool) -> AppResult<RunSummary> {
        let token = Uuid::new_v4().to_string();

        if force {
            warn!("Single-flight lock bypassed (--force)");
        } else if !self
            .control
            .try_acquire_lock(RUN_LOCK_KEY, &token, self.config.lock_ttl())
            .await?
        {
            info!("Pipeline already running, skipping this trigger");
            return Err(AppError::AlreadyRunning);
        }

        let result = self.run_stages().await;

        if !force {
            // Conditional on the token: a run that outlived its TTL must
            // not delete a successor's claim.
            if let Err(e) = self.control.release_lock(RUN_LOCK_KEY, &token).await {
                // Expiry reclaims the lock if the release is lost.
                warn!("Lock release failed: {}", e);
            }
        }

        match &result {
            Ok(summary) => info!(
                "Run completed: {} compared, {} events, {} notified, {} failures in {}ms",
                summary.assets_compared,
                summary.events_detected,
                summary.recipients_notified,
                summary.delivery_failures,
                summary.duration_ms
            ),
            Err(e) => error!(
                "Run failed in stage {}: {} (reason: {})",
                self.failed_stage(e).as_str(),
                e,
                e.reason_code()
            ),
        }

        result
    }

    fn failed_stage(&self, err: &AppError) -> RunStage {
        if err.is_source_error() {
            RunStage::Fetching
        } else if err.is_store_error() {
            RunStage::Comparing
        } else {
            RunStage::Failed
        }
    }

    async fn run_stages(&self) -> AppResult<RunSummary> {
        let started = Instant::now();

        debug!("Stage {}: top {} assets", RunStage::Fetching.as_str(), self.universe_size);
        let ticks = self.source.top_assets(self.universe_size).await?;

        debug!("Stage {}: {} ticks", RunStage::Comparing.as_str(), ticks.len());
        let outcome = self.comparator.compare(&ticks).await?;

        debug!(
            "Stage {}: {} event(s)",
            RunStage::Dispatching.as_str(),
            outcome.events.len()
        );
        let mut recipients_notified = 0u32;
        let mut delivery_failures = 0u32;

        for event in &outcome.events {
            info!(
                "New all-time high: {} ${} -> ${} (+{:.2}%)",
                event.asset_id, event.previous_ath, event.new_ath, event.percentage_increase
            );

            let recipients = match self.resolver.resolve(event).await {
                Ok(recipients) => recipients,
                Err(e) => {
                    // Eligibility store fault: conservatively skip this
                    // asset, the run itself carries on.
                    warn!("Skipping {} notifications: {}", event.asset_id, e);
                    continue;
                }
            };
            if recipients.is_empty() {
                debug!("No eligible recipients for {}", event.asset_id);
                continue;
            }

            match self.dispatcher.dispatch(event, &recipients).await {
                Ok(outcome) => {
                    recipients_notified += outcome.sent;
                    delivery_failures += outcome.failed;
                }
                Err(e) => {
                    warn!("Dispatch for {} did not start: {}", event.asset_id, e);
                    delivery_failures += recipients.len() as u32;
                }
            }
        }

        let summary = RunSummary {
            assets_compared: outcome.assets_compared,
            events_detected: outcome.events.len() as u32,
            recipients_notified,
            delivery_failures,
            duration_ms: started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        };

        // Observability only; a run is not failed for a status write.
        if let Err(e) = self.control.record_last_run(&summary).await {
            warn!("Could not persist run summary: {}", e);
        }

        debug!("Stage {}", RunStage::Completed.as_str());
        Ok(summary)
    }
}
