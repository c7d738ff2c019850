use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run summary returned to the trigger caller and persisted as the
/// "last successful run" status row. The only core state exposed to
/// external dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub assets_compared: u32,
    pub events_detected: u32,
    pub recipients_notified: u32,
    pub delivery_failures: u32,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}
