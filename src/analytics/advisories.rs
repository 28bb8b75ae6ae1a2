// Threshold-triggered advisories and per-reading anomalies

use chrono::{FixedOffset, Timelike};
use std::ops::RangeInclusive;

use super::mean;
use crate::models::{Advisory, AnalyticsSnapshot, Anomaly, AnomalyKind, Reading, Trend};

const LOW_POWER_FACTOR: f64 = 0.85;
const HIGH_DUTY_CYCLE_PERCENT: f64 = 80.0;
const MAINTENANCE_EFFICIENCY: f64 = 60.0;
/// 18:00 to 22:00 local, both ends included, in seconds from midnight.
const PEAK_WINDOW_SECS: RangeInclusive<u32> = 18 * 3600..=22 * 3600;
/// Peak-hour mean power must exceed the overall mean by this factor.
const PEAK_USAGE_RATIO: f64 = 1.2;
const VOLTAGE_MIN: f64 = 210.0;
const VOLTAGE_MAX: f64 = 230.0;

const ANOMALY_VOLTAGE_DEVIATION: f64 = 20.0;
const ANOMALY_POWER_RATIO: f64 = 2.0;
pub const MAX_ANOMALIES: usize = 5;

/// Advisories in display order. Each fires independently.
pub fn advisories(
    readings: &[Reading],
    snapshot: &AnalyticsSnapshot,
    zone: FixedOffset,
) -> Vec<Advisory> {
    if readings.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    if snapshot.average_power_factor < LOW_POWER_FACTOR {
        out.push(Advisory::PowerFactorCorrection);
    }
    if snapshot.compressor_duty_cycle_percent > HIGH_DUTY_CYCLE_PERCENT {
        out.push(Advisory::HighDutyCycle);
    }
    if snapshot.efficiency_score < MAINTENANCE_EFFICIENCY {
        out.push(Advisory::Maintenance);
    }
    if snapshot.power_trend == Trend::Increasing {
        out.push(Advisory::RisingConsumption);
    }
    if peak_usage_high(readings, snapshot.average_power, zone) {
        out.push(Advisory::PeakShaving);
    }
    if !(VOLTAGE_MIN..=VOLTAGE_MAX).contains(&snapshot.average_voltage) {
        out.push(Advisory::VoltageStabilizer);
    }
    out
}

fn peak_usage_high(readings: &[Reading], overall_mean: f64, zone: FixedOffset) -> bool {
    let peak: Vec<f64> = readings
        .iter()
        .filter(|r| {
            PEAK_WINDOW_SECS.contains(&r.time.with_timezone(&zone).num_seconds_from_midnight())
        })
        .map(|r| r.active_power)
        .collect();
    if peak.is_empty() || overall_mean <= 0.0 {
        return false;
    }
    mean(peak) > overall_mean * PEAK_USAGE_RATIO
}

/// Readings whose voltage is more than 20 V off the mean (checked first) or whose active
/// power is over twice the mean. First-found order, at most five.
pub fn detect_anomalies(readings: &[Reading]) -> Vec<Anomaly> {
    if readings.is_empty() {
        return Vec::new();
    }
    let mean_voltage = mean(readings.iter().map(|r| r.voltage));
    let mean_power = mean(readings.iter().map(|r| r.active_power));

    readings
        .iter()
        .filter_map(|r| {
            let deviation = r.voltage - mean_voltage;
            let kind = if deviation.abs() > ANOMALY_VOLTAGE_DEVIATION {
                AnomalyKind::Voltage {
                    voltage: r.voltage,
                    deviation,
                }
            } else if r.active_power > mean_power * ANOMALY_POWER_RATIO {
                AnomalyKind::PowerSpike {
                    active_power: r.active_power,
                    mean: mean_power,
                }
            } else {
                return None;
            };
            Some(Anomaly { time: r.time, kind })
        })
        .take(MAX_ANOMALIES)
        .collect()
}
