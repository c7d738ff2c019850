use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked asset with its recorded all-time high.
///
/// `ath` is a monotonic ratchet: it only moves up, and only the
/// comparator moves it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Asset {
    /// Market-data source identifier (e.g. "bitcoin")
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Decimal,
    pub market_cap_rank: i32,
    pub ath: Decimal,
    pub ath_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// One fetched market-data entry for a ranked asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTick {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Decimal,
    pub market_cap_rank: i32,
}

/// Whether `price` beats `stored_ath` by at least `threshold`
/// (a fraction; 0.0 means any positive delta counts).
pub fn beats(price: Decimal, stored_ath: Decimal, threshold: f64) -> bool {
    if price <= stored_ath {
        return false;
    }
    let factor = Decimal::from_f64(1.0 + threshold).unwrap_or(Decimal::ONE);
    price > stored_ath * factor
}
