// Analytics engine: pure functions over an ordered reading sequence.
// Canonical formulas only; nothing here holds state between calls.

mod advisories;

pub use advisories::{MAX_ANOMALIES, advisories, detect_anomalies};

use chrono::{FixedOffset, Timelike};

use crate::models::{
    AnalyticsSnapshot, CostProjection, DeviationBin, RangeSummary, Reading, Trend,
};

/// Power trend band: second-half mean vs first-half mean.
const POWER_TREND_BAND: f64 = 0.05;
/// Cost trend band: last cumulative cost vs midpoint cumulative cost.
const COST_TREND_BAND: f64 = 0.10;
const MS_PER_HOUR: f64 = 3_600_000.0;
const DAYS_PER_MONTH: f64 = 30.0;

/// Aggregates, trends and efficiency. Empty input gives the all-zero, stable snapshot.
pub fn compute_snapshot(readings: &[Reading]) -> AnalyticsSnapshot {
    let Some(last) = readings.last() else {
        return AnalyticsSnapshot::default();
    };

    let total_consumption: f64 = readings.iter().map(|r| r.active_power).sum();
    let average_power = total_consumption / readings.len() as f64;
    let peak_power = readings
        .iter()
        .map(|r| r.active_power)
        .fold(f64::NEG_INFINITY, f64::max);
    let average_voltage = mean(readings.iter().map(|r| r.voltage));
    let average_power_factor = mean(readings.iter().map(|r| r.power_factor));
    let compressor_duty_cycle_percent = duty_cycle_percent(readings);

    AnalyticsSnapshot {
        total_consumption,
        average_power,
        peak_power,
        total_cost: last.cumulative_cost,
        average_voltage,
        average_current: mean(readings.iter().map(|r| r.current)),
        average_power_factor,
        compressor_duty_cycle_percent,
        power_trend: power_trend(readings),
        cost_trend: cost_trend(readings),
        efficiency_score: efficiency_score(
            average_power_factor,
            compressor_duty_cycle_percent,
            average_voltage,
        ),
    }
}

/// pf × 50 + (1 − duty fraction) × 30 + (20 if mean voltage > 220 V else 10), clamped to 0..=100.
pub fn efficiency_score(mean_power_factor: f64, duty_cycle_percent: f64, mean_voltage: f64) -> f64 {
    let voltage_points = if mean_voltage > 220.0 { 20.0 } else { 10.0 };
    let score =
        mean_power_factor * 50.0 + (1.0 - duty_cycle_percent / 100.0) * 30.0 + voltage_points;
    score.clamp(0.0, 100.0)
}

/// Share of readings with the compressor on, in percent.
pub fn duty_cycle_percent(readings: &[Reading]) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    let on = readings.iter().filter(|r| r.compressor_on).count();
    on as f64 / readings.len() as f64 * 100.0
}

/// Mean active power of the second half against the first half (split at len / 2).
pub fn power_trend(readings: &[Reading]) -> Trend {
    if readings.len() < 2 {
        return Trend::Stable;
    }
    let (first, second) = readings.split_at(readings.len() / 2);
    classify(
        mean(second.iter().map(|r| r.active_power)),
        mean(first.iter().map(|r| r.active_power)),
        POWER_TREND_BAND,
    )
}

/// Point comparison: cumulative cost at the midpoint against the last reading.
pub fn cost_trend(readings: &[Reading]) -> Trend {
    let (Some(last), true) = (readings.last(), readings.len() >= 2) else {
        return Trend::Stable;
    };
    let mid = &readings[readings.len() / 2];
    classify(last.cumulative_cost, mid.cumulative_cost, COST_TREND_BAND)
}

fn classify(value: f64, reference: f64, band: f64) -> Trend {
    if value > reference * (1.0 + band) {
        Trend::Increasing
    } else if value < reference * (1.0 - band) {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Cost accrued over the span of `readings`, extrapolated to a day and a 30-day month.
pub fn project_cost(readings: &[Reading]) -> CostProjection {
    let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
        return CostProjection::default();
    };
    let hours = (last.time - first.time).num_milliseconds() as f64 / MS_PER_HOUR;
    if hours <= 0.0 {
        return CostProjection::default();
    }
    let hourly_rate = (last.cumulative_cost - first.cumulative_cost).max(0.0) / hours;
    CostProjection {
        hourly_rate,
        daily: hourly_rate * 24.0,
        monthly: hourly_rate * 24.0 * DAYS_PER_MONTH,
    }
}

/// Energy and cost accrued in the window, mean voltage, and the latest 24 h duty cycle.
pub fn range_summary(readings: &[Reading]) -> RangeSummary {
    let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
        return RangeSummary::default();
    };
    RangeSummary {
        energy_kwh: last.cumulative_energy - first.cumulative_energy,
        cost: last.cumulative_cost - first.cumulative_cost,
        average_voltage: mean(readings.iter().map(|r| r.voltage)),
        duty_cycle_now: last.duty_cycle_percent_24h,
    }
}

/// kWh per local hour of day, from positive steps in cumulative energy.
/// Each step is attributed to the hour of the later reading.
pub fn energy_by_hour(readings: &[Reading], zone: FixedOffset) -> [f64; 24] {
    let mut hours = [0.0; 24];
    for pair in readings.windows(2) {
        let delta = pair[1].cumulative_energy - pair[0].cumulative_energy;
        if delta > 0.0 {
            let hour = pair[1].time.with_timezone(&zone).hour() as usize;
            hours[hour] += delta;
        }
    }
    hours
}

pub const NOMINAL_VOLTAGE: f64 = 230.0;
pub const DEVIATION_BINS: usize = 40;

/// Equal-width histogram of `(V - nominal) / nominal * 100` spanning the observed
/// deviations. Readings without a positive voltage are skipped. A single distinct
/// deviation gives one zero-width bin.
pub fn voltage_deviation_histogram(
    readings: &[Reading],
    nominal: f64,
    bins: usize,
) -> Vec<DeviationBin> {
    if bins == 0 || nominal <= 0.0 {
        return Vec::new();
    }
    let deviations: Vec<f64> = readings
        .iter()
        .filter(|r| r.voltage.is_finite() && r.voltage > 0.0)
        .map(|r| (r.voltage - nominal) / nominal * 100.0)
        .collect();
    let Some((min, max)) = deviations.iter().fold(None, |bounds, &d| match bounds {
        None => Some((d, d)),
        Some((lo, hi)) => Some((f64::min(lo, d), f64::max(hi, d))),
    }) else {
        return Vec::new();
    };
    if max <= min {
        return vec![DeviationBin {
            lower_percent: min,
            upper_percent: max,
            count: deviations.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for d in &deviations {
        // the maximum lands on the upper edge of the last bin
        let i = (((d - min) / width) as usize).min(bins - 1);
        counts[i] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| DeviationBin {
            lower_percent: min + width * i as f64,
            upper_percent: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Arithmetic mean; 0.0 for no values.
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
