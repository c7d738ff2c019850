//! Athwatch Backend Library
//!
//! This module exposes the ATH detection & notification pipeline
//! components for use by the CLI binary, tests, and other consumers.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repositories::{
    AssetRepository, ControlRepository, DeliveryRepository, SharedAssetStore, SharedControlStore,
    SharedDeliveryLedger, SharedSubscriptionStore, SharedUserStore, SubscriptionRepository,
    UserRepository,
};
use services::mailer::SharedEmailSender;
use services::market_data::SharedMarketDataSource;
use services::{
    CoinGeckoSource, Comparator, Dispatcher, EligibilityResolver, HttpEmailSender, Pipeline,
};
use std::sync::Arc;

/// Application state containing the store surfaces and external
/// collaborators the pipeline is wired from.
pub struct AppState {
    pub config: AppConfig,
    pub assets: SharedAssetStore,
    pub users: SharedUserStore,
    pub subscriptions: SharedSubscriptionStore,
    pub ledger: SharedDeliveryLedger,
    pub control: SharedControlStore,
    pub market_source: SharedMarketDataSource,
    pub email_sender: SharedEmailSender,
}

impl AppState {
    /// Create a new AppState with the production (Postgres + HTTP)
    /// implementations behind every seam.
    pub fn new(pool: sqlx::PgPool, config: AppConfig) -> Self {
        let market_source: SharedMarketDataSource = Arc::new(CoinGeckoSource::new(&config.market));
        let email_sender: SharedEmailSender = Arc::new(HttpEmailSender::new(&config.email));

        Self {
            assets: Arc::new(AssetRepository::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool.clone())),
            subscriptions: Arc::new(SubscriptionRepository::new(pool.clone())),
            ledger: Arc::new(DeliveryRepository::new(pool.clone())),
            control: Arc::new(ControlRepository::new(pool)),
            market_source,
            email_sender,
            config,
        }
    }

    /// Wire a pipeline from this state.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.market_source.clone(),
            Comparator::new(self.assets.clone(), self.config.pipeline.ath_threshold),
            self.resolver(),
            self.dispatcher(),
            self.control.clone(),
            self.config.pipeline.clone(),
            self.config.market.universe_size,
        )
    }

    pub fn resolver(&self) -> EligibilityResolver {
        EligibilityResolver::new(
            self.users.clone(),
            self.subscriptions.clone(),
            self.control.clone(),
            self.config.pipeline.cooldown(),
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.ledger.clone(),
            self.users.clone(),
            self.subscriptions.clone(),
            self.assets.clone(),
            self.email_sender.clone(),
            self.config.pipeline.dispatch_concurrency,
        )
    }
}
