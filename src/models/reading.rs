// Meter reading and power-factor classification

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse bucketing of the continuous power factor; serializes as "Excellent", "Good", ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerFactorClass {
    Excellent,
    Good,
    Poor,
    Bad,
}

impl PowerFactorClass {
    /// Strict thresholds: a boundary value belongs to the lower class.
    pub fn from_power_factor(pf: f64) -> Self {
        if pf > 0.95 {
            PowerFactorClass::Excellent
        } else if pf > 0.85 {
            PowerFactorClass::Good
        } else if pf > 0.75 {
            PowerFactorClass::Poor
        } else {
            PowerFactorClass::Bad
        }
    }
}

/// One sampled instant from the meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub time: DateTime<Utc>,
    pub voltage: f64,
    pub frequency: f64,
    pub current: f64,
    /// kW
    pub active_power: f64,
    pub power_factor: f64,
    /// kVA
    pub apparent_power: f64,
    /// kVAr
    pub reactive_power: f64,
    /// kWh, non-decreasing across a well-formed sequence.
    pub cumulative_energy: f64,
    pub cumulative_cost: f64,
    pub power_factor_class: PowerFactorClass,
    pub compressor_on: bool,
    pub duty_cycle_percent_24h: f64,
    pub cycle_id: i64,
}

/// Sentinel the source sheet writes when the compressor is running.
pub const COMPRESSOR_ON: &str = "ON";

impl Reading {
    /// All-zero reading at `time`; used as the offline placeholder.
    pub fn zeroed(time: DateTime<Utc>) -> Self {
        Self {
            time,
            voltage: 0.0,
            frequency: 0.0,
            current: 0.0,
            active_power: 0.0,
            power_factor: 0.0,
            apparent_power: 0.0,
            reactive_power: 0.0,
            cumulative_energy: 0.0,
            cumulative_cost: 0.0,
            power_factor_class: PowerFactorClass::Bad,
            compressor_on: false,
            duty_cycle_percent_24h: 0.0,
            cycle_id: 0,
        }
    }

    /// Wall-clock time string in the meter zone, e.g. "2024-05-01 14:05:00".
    pub fn formatted_time(&self, zone: FixedOffset) -> String {
        self.time
            .with_timezone(&zone)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// Renders the reading back into the positional 15-cell sheet row.
    /// Cells 11 and 12 are not part of the reading and come back empty.
    pub fn to_cells(&self, zone: FixedOffset) -> Vec<Value> {
        let flag = if self.compressor_on { COMPRESSOR_ON } else { "OFF" };
        vec![
            Value::from(self.formatted_time(zone)),
            Value::from(flag),
            Value::from(self.voltage),
            Value::from(self.frequency),
            Value::from(self.current),
            Value::from(self.active_power),
            Value::from(self.power_factor),
            Value::from(self.apparent_power),
            Value::from(self.reactive_power),
            Value::from(self.cumulative_energy),
            Value::from(self.cumulative_cost),
            Value::from(""),
            Value::from(""),
            Value::from(self.duty_cycle_percent_24h),
            Value::from(self.cycle_id),
        ]
    }
}
