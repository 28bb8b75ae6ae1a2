// Derived analytics: snapshot, projections and findings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a series between its two halves; serializes to lowercase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

/// Aggregates over one reading sequence. Default is the empty-input snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_consumption: f64,
    pub average_power: f64,
    pub peak_power: f64,
    pub total_cost: f64,
    pub average_voltage: f64,
    pub average_current: f64,
    pub average_power_factor: f64,
    pub compressor_duty_cycle_percent: f64,
    pub power_trend: Trend,
    pub cost_trend: Trend,
    /// 0-100
    pub efficiency_score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostProjection {
    pub hourly_rate: f64,
    pub daily: f64,
    /// 30 days
    pub monthly: f64,
}

/// KPI tiles for a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSummary {
    pub energy_kwh: f64,
    pub cost: f64,
    pub average_voltage: f64,
    pub duty_cycle_now: f64,
}

/// One bar of the voltage deviation histogram, in percent of nominal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationBin {
    pub lower_percent: f64,
    pub upper_percent: f64,
    pub count: usize,
}

/// Recommendation triggered by a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Advisory {
    PowerFactorCorrection,
    HighDutyCycle,
    Maintenance,
    RisingConsumption,
    PeakShaving,
    VoltageStabilizer,
}

impl Advisory {
    pub fn message(self) -> &'static str {
        match self {
            Advisory::PowerFactorCorrection => {
                "Power factor is low. Consider power factor correction capacitors."
            }
            Advisory::HighDutyCycle => {
                "Compressor duty cycle is high. Check the door gasket, coils and ambient heat."
            }
            Advisory::Maintenance => {
                "Overall efficiency is below 60. Schedule a maintenance check."
            }
            Advisory::RisingConsumption => {
                "Power consumption is trending upward. Keep monitoring for a developing fault."
            }
            Advisory::PeakShaving => {
                "Usage is high during peak hours (18:00-22:00). Shift load off-peak where possible."
            }
            Advisory::VoltageStabilizer => {
                "Supply voltage is outside 210-230 V. A voltage stabilizer would protect the compressor."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AnomalyKind {
    #[serde(rename_all = "camelCase")]
    Voltage { voltage: f64, deviation: f64 },
    #[serde(rename_all = "camelCase")]
    PowerSpike { active_power: f64, mean: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}
