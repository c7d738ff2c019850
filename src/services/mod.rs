pub mod comparator;
pub mod dispatcher;
pub mod eligibility;
pub mod mailer;
pub mod market_data;
pub mod pipeline;

pub use comparator::{CompareOutcome, Comparator};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use eligibility::{EligibilityResolver, ReconcileReport};
pub use mailer::{EmailSender, HttpEmailSender, OutboundEmail, SendError};
pub use market_data::{CoinGeckoSource, MarketDataSource};
pub use pipeline::{Pipeline, RunStage, RUN_LOCK_KEY};
