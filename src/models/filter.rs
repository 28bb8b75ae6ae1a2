// Declarative filter over a reading set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which compressor state to keep; serializes to lowercase ("all", "on", "off").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressorStatus {
    #[default]
    All,
    On,
    Off,
}

impl CompressorStatus {
    pub fn matches(self, compressor_on: bool) -> bool {
        match self {
            CompressorStatus::All => true,
            CompressorStatus::On => compressor_on,
            CompressorStatus::Off => !compressor_on,
        }
    }
}

/// Inclusive bounds on `time`; `None` is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Inclusive bounds on `active_power` (kW).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// All predicates are ANDed. The default spec keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub search_text: String,
    pub date_range: DateRange,
    pub power_range: PowerRange,
    pub compressor_status: CompressorStatus,
}
