use crate::config::MarketDataConfig;
use crate::error::{AppError, AppResult};
use crate::models::MarketTick;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Source of ranked market data for the tracked asset universe.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Current price/rank for the top `limit` assets by market cap.
    async fn top_assets(&self, limit: u32) -> AppResult<Vec<MarketTick>>;
}

pub type SharedMarketDataSource = Arc<dyn MarketDataSource>;

/// CoinGecko-backed market data source, `/coins/markets` endpoint.
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl CoinGeckoSource {
    pub fn new(config: &MarketDataConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        }
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoSource {
    async fn top_assets(&self, limit: u32) -> AppResult<Vec<MarketTick>> {
        let url = format!("{}/coins/markets", self.base_url);
        let per_page = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
            ])
            .header("accept", "application/json")
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::SourceMalformed(e.to_string()))?;

        parse_ticks(body)
    }
}

/// Parse the response array entry by entry. A malformed entry drops
/// that asset only; an unreadable payload fails the whole fetch.
pub fn parse_ticks(body: serde_json::Value) -> AppResult<Vec<MarketTick>> {
    let entries = body
        .as_array()
        .ok_or_else(|| AppError::SourceMalformed("expected a JSON array".to_string()))?;

    let mut ticks = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<MarketTick>(entry.clone()) {
            Ok(tick) => ticks.push(tick),
            Err(e) => {
                let id = entry
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("<unknown>");
                warn!("Skipping malformed market entry {}: {}", id, e);
            }
        }
    }

    Ok(ticks)
}
