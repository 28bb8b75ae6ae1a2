// Filter/selector: FilterSpec applied to an ordered reading set (order preserved)

use chrono::{FixedOffset, NaiveDate};

use crate::models::{FilterSpec, Reading};

/// Keeps readings matching every predicate of `spec`. The default spec is the identity.
pub fn apply(readings: &[Reading], spec: &FilterSpec, zone: FixedOffset) -> Vec<Reading> {
    // blank text disables search; otherwise the text matches as typed, spaces included
    let searching = !spec.search_text.trim().is_empty();
    let needle = spec.search_text.to_lowercase();
    readings
        .iter()
        .filter(|r| !searching || r.formatted_time(zone).to_lowercase().contains(&needle))
        .filter(|r| spec.date_range.start.is_none_or(|start| r.time >= start))
        .filter(|r| spec.date_range.end.is_none_or(|end| r.time <= end))
        .filter(|r| spec.power_range.min.is_none_or(|min| r.active_power >= min))
        .filter(|r| spec.power_range.max.is_none_or(|max| r.active_power <= max))
        .filter(|r| spec.compressor_status.matches(r.compressor_on))
        .cloned()
        .collect()
}

/// Readings whose calendar date in `zone` is `date`.
pub fn on_date(readings: &[Reading], date: NaiveDate, zone: FixedOffset) -> Vec<Reading> {
    readings
        .iter()
        .filter(|r| r.time.with_timezone(&zone).date_naive() == date)
        .cloned()
        .collect()
}
