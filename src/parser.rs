// Row parser: raw sheet cells (or loose JSON objects) -> Reading.
// Total over any input: bad cells become 0.0, bad timestamps become the Unix epoch.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::models::{COMPRESSOR_ON, PowerFactorClass, Reading};

pub const IDX_TIME: usize = 0;
pub const IDX_COMPRESSOR: usize = 1;
pub const IDX_VOLTAGE: usize = 2;
pub const IDX_FREQUENCY: usize = 3;
pub const IDX_CURRENT: usize = 4;
pub const IDX_ACTIVE_POWER: usize = 5;
pub const IDX_POWER_FACTOR: usize = 6;
pub const IDX_APPARENT_POWER: usize = 7;
pub const IDX_REACTIVE_POWER: usize = 8;
pub const IDX_CUMULATIVE_ENERGY: usize = 9;
pub const IDX_CUMULATIVE_COST: usize = 10;
pub const IDX_DUTY_CYCLE: usize = 13;
pub const IDX_CYCLE_ID: usize = 14;

/// Number of cells in a full row (sheet range A:O).
pub const ROW_WIDTH: usize = 15;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Below this a bare number is a spreadsheet serial day, below EPOCH_MILLIS_FLOOR epoch seconds.
const SERIAL_DAY_CEILING: f64 = 1e6;
const EPOCH_MILLIS_FLOOR: f64 = 1e11;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Key aliases for object rows, normalized (lowercase, alphanumerics only).
const FIELD_ALIASES: &[(usize, &[&str])] = &[
    (IDX_TIME, &["time", "timestamp", "datetime"]),
    (IDX_COMPRESSOR, &["compressor", "compressorstatus", "compressoron"]),
    (IDX_VOLTAGE, &["voltage", "voltagev"]),
    (IDX_FREQUENCY, &["frequency", "frequencyhz"]),
    (IDX_CURRENT, &["current", "currenta"]),
    (IDX_ACTIVE_POWER, &["activepower", "activepowerkw"]),
    (IDX_POWER_FACTOR, &["powerfactor", "pf"]),
    (IDX_APPARENT_POWER, &["apparentpower", "apparentpowerkva"]),
    (IDX_REACTIVE_POWER, &["reactivepower", "reactivepowerkvar"]),
    (IDX_CUMULATIVE_ENERGY, &["cumulativeenergy", "energykwh"]),
    (IDX_CUMULATIVE_COST, &["cumulativecost", "costcumbdt", "costcum"]),
    (IDX_DUTY_CYCLE, &["dutycyclepercent24h", "dutycycle24h", "dutycycle"]),
    (IDX_CYCLE_ID, &["cycleid", "cycle"]),
];

/// Parses rows, interpreting naive timestamps in the meter's fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct RowParser {
    zone: FixedOffset,
}

impl Default for RowParser {
    fn default() -> Self {
        Self::new(utc_zone())
    }
}

impl RowParser {
    pub fn new(zone: FixedOffset) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub fn parse_row(&self, cells: &[Value]) -> Reading {
        let time = cells
            .get(IDX_TIME)
            .and_then(|v| parse_timestamp(v, self.zone))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let compressor_on = matches!(
            cells.get(IDX_COMPRESSOR),
            Some(Value::String(s)) if s == COMPRESSOR_ON
        );
        let power_factor = number_at(cells, IDX_POWER_FACTOR);

        Reading {
            time,
            voltage: number_at(cells, IDX_VOLTAGE),
            frequency: number_at(cells, IDX_FREQUENCY),
            current: number_at(cells, IDX_CURRENT),
            active_power: number_at(cells, IDX_ACTIVE_POWER),
            power_factor,
            apparent_power: number_at(cells, IDX_APPARENT_POWER),
            reactive_power: number_at(cells, IDX_REACTIVE_POWER),
            cumulative_energy: number_at(cells, IDX_CUMULATIVE_ENERGY),
            cumulative_cost: number_at(cells, IDX_CUMULATIVE_COST),
            power_factor_class: PowerFactorClass::from_power_factor(power_factor),
            compressor_on,
            duty_cycle_percent_24h: number_at(cells, IDX_DUTY_CYCLE),
            cycle_id: number_at(cells, IDX_CYCLE_ID).trunc() as i64,
        }
    }

    pub fn parse_rows(&self, rows: &[Vec<Value>]) -> Vec<Reading> {
        rows.iter().map(|r| self.parse_row(r)).collect()
    }
}

/// Parses one row with naive timestamps taken as UTC.
pub fn parse_row(cells: &[Value]) -> Reading {
    RowParser::default().parse_row(cells)
}

pub fn utc_zone() -> FixedOffset {
    Utc.fix()
}

/// Numeric cell value; `None` for anything that is not a finite number.
pub fn cell_to_f64(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

fn number_at(cells: &[Value], idx: usize) -> f64 {
    cells.get(idx).and_then(cell_to_f64).unwrap_or(0.0)
}

/// Accepts RFC 3339, common naive layouts (taken in `zone`), spreadsheet serial days,
/// epoch seconds and epoch milliseconds.
pub fn parse_timestamp(value: &Value, zone: FixedOffset) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_number(n.as_f64()?, zone),
        Value::String(s) => parse_timestamp_str(s, zone),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str, zone: FixedOffset) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_utc(naive, zone);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local_to_utc(date.and_hms_opt(0, 0, 0)?, zone);
    }
    let x = s.parse::<f64>().ok()?;
    from_number(x, zone)
}

fn from_number(x: f64, zone: FixedOffset) -> Option<DateTime<Utc>> {
    if !x.is_finite() || x < 0.0 {
        return None;
    }
    if x < SERIAL_DAY_CEILING {
        let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
        let naive = base.checked_add_signed(Duration::milliseconds((x * MS_PER_DAY).round() as i64))?;
        local_to_utc(naive, zone)
    } else if x < EPOCH_MILLIS_FLOOR {
        DateTime::from_timestamp_millis((x * 1000.0).round() as i64)
    } else {
        DateTime::from_timestamp_millis(x.round() as i64)
    }
}

pub(crate) fn local_to_utc(naive: NaiveDateTime, zone: FixedOffset) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Maps a loosely-typed object row onto the positional layout.
/// A boolean `true` compressor field becomes the "ON" sentinel.
pub fn record_to_cells(record: &Map<String, Value>) -> Vec<Value> {
    let mut cells = vec![Value::Null; ROW_WIDTH];
    for (key, value) in record {
        let key = normalize_key(key);
        let Some((idx, _)) = FIELD_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&key.as_str()))
        else {
            continue;
        };
        cells[*idx] = match (idx, value) {
            (&IDX_COMPRESSOR, Value::Bool(true)) => Value::from(COMPRESSOR_ON),
            _ => value.clone(),
        };
    }
    cells
}
