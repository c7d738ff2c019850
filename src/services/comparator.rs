use crate::error::AppResult;
use crate::models::asset::beats;
use crate::models::{Asset, AthEvent, MarketTick};
use crate::repositories::SharedAssetStore;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of one comparison pass.
pub struct CompareOutcome {
    pub assets_compared: u32,
    pub events: Vec<AthEvent>,
}

/// Compares fetched prices against the stored ATH ratchet and emits an
/// event per asset whose ratchet it advances.
pub struct Comparator {
    assets: SharedAssetStore,
    threshold: f64,
}

impl Comparator {
    pub fn new(assets: SharedAssetStore, threshold: f64) -> Self {
        Self { assets, threshold }
    }

    /// Compare every fetched tick against the store snapshot.
    ///
    /// A store fault on one asset skips that asset only; a fault on the
    /// snapshot read aborts before anything is written. Zero events is
    /// the ordinary outcome.
    pub async fn compare(&self, ticks: &[MarketTick]) -> AppResult<CompareOutcome> {
        let snapshot = self.assets.all().await?;
        let by_id: HashMap<&str, &Asset> =
            snapshot.iter().map(|a| (a.id.as_str(), a)).collect();

        let now = Utc::now();
        let mut events = Vec::new();
        let mut compared = 0u32;

        for tick in ticks {
            if tick.current_price <= Decimal::ZERO {
                warn!("Quarantining non-positive price for {}", tick.id);
                continue;
            }
            compared += 1;

            match by_id.get(tick.id.as_str()) {
                Some(stored) if beats(tick.current_price, stored.ath, self.threshold) => {
                    match self.assets.record_ath(tick, stored.ath, now).await {
                        Ok(true) => {
                            events.push(AthEvent::new(
                                tick.id.clone(),
                                tick.symbol.clone(),
                                tick.name.clone(),
                                stored.ath,
                                tick.current_price,
                                now,
                            ));
                        }
                        Ok(false) => {
                            // Another writer advanced the ratchet first.
                            debug!("Lost ATH compare-and-set for {}", tick.id);
                        }
                        Err(e) => {
                            warn!("Skipping {} after store fault: {}", tick.id, e);
                        }
                    }
                }
                _ => {
                    // Price refresh; creates the record on first sight.
                    if let Err(e) = self.assets.upsert_price(tick, now).await {
                        warn!("Skipping {} after store fault: {}", tick.id, e);
                    }
                }
            }
        }

        Ok(CompareOutcome {
            assets_compared: compared,
            events,
        })
    }
}
