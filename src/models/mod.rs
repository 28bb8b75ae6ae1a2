// Domain models: readings, filters, analytics, live updates

mod analytics;
mod filter;
mod reading;

pub use analytics::{
    Advisory, AnalyticsSnapshot, Anomaly, AnomalyKind, CostProjection, DeviationBin, RangeSummary,
    Trend,
};
pub use filter::{CompressorStatus, DateRange, FilterSpec, PowerRange};
pub use reading::{COMPRESSOR_ON, PowerFactorClass, Reading};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pushed to /ws/live after every latest-refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUpdate {
    pub timestamp: DateTime<Utc>,
    pub is_online: bool,
    pub current: Option<Reading>,
}
