use chrono::FixedOffset;
use serde::Deserialize;

use crate::parser::utc_zone;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub meter: MeterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Which backend feeds the engine; lowercase in TOML ("sheets", "snapshot").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Sheets,
    Snapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub sheet_id: String,
    /// Overridden by SHEETS_API_KEY when set.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_range")]
    pub range: String,
    /// http(s) URL or filesystem path of the regenerated JSON snapshot.
    #[serde(default = "default_snapshot_location")]
    pub snapshot_location: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://sheets.googleapis.com".into()
}

fn default_range() -> String {
    "ProcessedData!A:O".into()
}

fn default_snapshot_location() -> String {
    "./data/energy-data.json".into()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

/// What `current_reading` shows after a failed latest-refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflineReading {
    /// Keep the last good reading.
    #[default]
    Retain,
    /// Replace it with a zeroed reading carrying the last timestamp.
    Zero,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// 30 for the live sheet; 300 suits the regenerated snapshot.
    pub refresh_interval_secs: u64,
    pub liveness_interval_secs: u64,
    pub online_threshold_secs: u64,
    pub refresh_today_on_tick: bool,
    pub offline_reading: OfflineReading,
    /// How often to log sync stats (fetches ok/failed, stale completions) at INFO level.
    pub stats_log_interval_secs: u64,
    /// Max number of live updates kept for /ws/live (slow clients may lag).
    pub broadcast_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            liveness_interval_secs: 60,
            online_threshold_secs: 600,
            refresh_today_on_tick: true,
            offline_reading: OfflineReading::Retain,
            stats_log_interval_secs: 300,
            broadcast_capacity: 16,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Fixed offset of the meter's wall clock. Naive sheet timestamps, calendar dates and
    /// peak hours are all taken in this zone.
    pub utc_offset_minutes: i32,
}

impl MeterConfig {
    pub fn zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(utc_zone)
    }
}

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
/// Upper bound for every `*_secs` setting (one year).
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 3600;

fn ensure_interval(key: &str, secs: u64) -> anyhow::Result<()> {
    anyhow::ensure!(secs > 0, "{} must be > 0, got {}", key, secs);
    anyhow::ensure!(
        secs <= MAX_INTERVAL_SECS,
        "{} must be <= {}, got {}",
        key,
        MAX_INTERVAL_SECS,
        secs
    );
    Ok(())
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        let mut config: AppConfig = toml::from_str(&s)?;
        if let Ok(key) = std::env::var("SHEETS_API_KEY") {
            config.source.api_key = key;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        match self.source.kind {
            SourceKind::Sheets => {
                anyhow::ensure!(
                    !self.source.sheet_id.is_empty(),
                    "source.sheet_id must be non-empty for kind = \"sheets\""
                );
                anyhow::ensure!(
                    !self.source.api_key.is_empty(),
                    "source.api_key must be non-empty for kind = \"sheets\" (or set SHEETS_API_KEY)"
                );
                anyhow::ensure!(
                    !self.source.range.is_empty(),
                    "source.range must be non-empty"
                );
            }
            SourceKind::Snapshot => {
                anyhow::ensure!(
                    !self.source.snapshot_location.is_empty(),
                    "source.snapshot_location must be non-empty for kind = \"snapshot\""
                );
            }
        }
        ensure_interval("source.fetch_timeout_secs", self.source.fetch_timeout_secs)?;
        ensure_interval("sync.refresh_interval_secs", self.sync.refresh_interval_secs)?;
        ensure_interval("sync.liveness_interval_secs", self.sync.liveness_interval_secs)?;
        ensure_interval("sync.online_threshold_secs", self.sync.online_threshold_secs)?;
        ensure_interval("sync.stats_log_interval_secs", self.sync.stats_log_interval_secs)?;
        anyhow::ensure!(
            self.sync.broadcast_capacity > 0,
            "sync.broadcast_capacity must be > 0, got {}",
            self.sync.broadcast_capacity
        );
        anyhow::ensure!(
            self.meter.utc_offset_minutes.abs() <= MAX_UTC_OFFSET_MINUTES,
            "meter.utc_offset_minutes must be within ±{}, got {}",
            MAX_UTC_OFFSET_MINUTES,
            self.meter.utc_offset_minutes
        );
        Ok(())
    }
}
