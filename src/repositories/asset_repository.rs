use crate::error::AppResult;
use crate::models::{Asset, MarketTick};
use crate::repositories::AssetStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Postgres-backed asset store
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    /// Create a new AssetRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetStore for AssetRepository {
    async fn all(&self) -> AppResult<Vec<Asset>> {
        let assets = sqlx::query_as::<_, Asset>(
            r#"
            SELECT id, symbol, name, current_price, market_cap_rank, ath, ath_date, last_updated
            FROM assets
            ORDER BY market_cap_rank
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(assets)
    }

    async fn upsert_price(&self, tick: &MarketTick, now: DateTime<Utc>) -> AppResult<()> {
        // First ingestion seeds the ratchet at the current price; the
        // conflict arm deliberately leaves ath/ath_date alone.
        sqlx::query(
            r#"
            INSERT INTO assets (id, symbol, name, current_price, market_cap_rank, ath, ath_date, last_updated)
            VALUES ($1, $2, $3, $4, $5, $4, $6, $6)
            ON CONFLICT (id) DO UPDATE SET
                symbol = EXCLUDED.symbol,
                name = EXCLUDED.name,
                current_price = EXCLUDED.current_price,
                market_cap_rank = EXCLUDED.market_cap_rank,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(&tick.id)
        .bind(&tick.symbol)
        .bind(&tick.name)
        .bind(tick.current_price)
        .bind(tick.market_cap_rank)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_ath(
        &self,
        tick: &MarketTick,
        previous_ath: Decimal,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        // Compare-and-set on the previously observed ATH keeps the
        // ratchet monotonic under concurrent writers.
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET ath = $2,
                ath_date = $3,
                current_price = $2,
                market_cap_rank = $4,
                last_updated = $3
            WHERE id = $1 AND ath = $5
            "#,
        )
        .bind(&tick.id)
        .bind(tick.current_price)
        .bind(at)
        .bind(tick.market_cap_rank)
        .bind(previous_ath)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
