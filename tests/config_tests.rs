// Config loading and validation tests

use meterwatch::config::{AppConfig, MAX_INTERVAL_SECS, OfflineReading, SourceKind};
use std::io::Write;

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[source]
kind = "sheets"
sheet_id = "1AbCdEf"
api_key = "test-key"
range = "ProcessedData!A:O"
fetch_timeout_secs = 10

[sync]
refresh_interval_secs = 30
liveness_interval_secs = 60
online_threshold_secs = 600
broadcast_capacity = 16

[meter]
utc_offset_minutes = 360
"#;

const SNAPSHOT_CONFIG: &str = r#"
[server]
port = 8081
host = "127.0.0.1"

[source]
kind = "snapshot"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.source.kind, SourceKind::Sheets);
    assert_eq!(config.source.sheet_id, "1AbCdEf");
    assert_eq!(config.source.range, "ProcessedData!A:O");
    assert_eq!(config.sync.refresh_interval_secs, 30);
    assert_eq!(config.sync.online_threshold_secs, 600);
    assert_eq!(config.meter.zone().local_minus_utc(), 6 * 3600);
}

#[test]
fn test_config_defaults_for_optional_sections() {
    let config = AppConfig::load_from_str(SNAPSHOT_CONFIG).expect("load_from_str");
    assert_eq!(config.source.kind, SourceKind::Snapshot);
    assert_eq!(config.source.snapshot_location, "./data/energy-data.json");
    assert_eq!(config.source.base_url, "https://sheets.googleapis.com");
    assert_eq!(config.source.fetch_timeout_secs, 10);
    assert_eq!(config.sync.refresh_interval_secs, 30);
    assert_eq!(config.sync.liveness_interval_secs, 60);
    assert_eq!(config.sync.online_threshold_secs, 600);
    assert!(config.sync.refresh_today_on_tick);
    assert_eq!(config.sync.offline_reading, OfflineReading::Retain);
    assert_eq!(config.meter.utc_offset_minutes, 0);
}

#[test]
fn test_config_offline_reading_zero() {
    let cfg = format!("{SNAPSHOT_CONFIG}\n[sync]\noffline_reading = \"zero\"\n");
    let config = AppConfig::load_from_str(&cfg).expect("load_from_str");
    assert_eq!(config.sync.offline_reading, OfflineReading::Zero);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_sheet_id() {
    let bad = VALID_CONFIG.replace("sheet_id = \"1AbCdEf\"", "sheet_id = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("source.sheet_id"));
}

#[test]
fn test_config_validation_rejects_missing_api_key() {
    let bad = VALID_CONFIG.replace("api_key = \"test-key\"\n", "");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("source.api_key"));
}

#[test]
fn test_config_validation_rejects_empty_range() {
    let bad = VALID_CONFIG.replace("range = \"ProcessedData!A:O\"", "range = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("source.range"));
}

#[test]
fn test_config_validation_rejects_fetch_timeout_zero() {
    let bad = VALID_CONFIG.replace("fetch_timeout_secs = 10", "fetch_timeout_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("fetch_timeout_secs"));
}

#[test]
fn test_config_validation_rejects_refresh_interval_zero() {
    let bad = VALID_CONFIG.replace("refresh_interval_secs = 30", "refresh_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("refresh_interval_secs"));
}

#[test]
fn test_config_validation_rejects_liveness_interval_zero() {
    let bad = VALID_CONFIG.replace("liveness_interval_secs = 60", "liveness_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("liveness_interval_secs"));
}

#[test]
fn test_config_validation_rejects_online_threshold_zero() {
    let bad = VALID_CONFIG.replace("online_threshold_secs = 600", "online_threshold_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("online_threshold_secs"));
}

#[test]
fn test_config_validation_rejects_intervals_over_a_year() {
    let over = MAX_INTERVAL_SECS + 1;
    let cases = [
        ("fetch_timeout_secs = 10", "source.fetch_timeout_secs"),
        ("refresh_interval_secs = 30", "sync.refresh_interval_secs"),
        ("liveness_interval_secs = 60", "sync.liveness_interval_secs"),
        ("online_threshold_secs = 600", "sync.online_threshold_secs"),
    ];
    for (line, key) in cases {
        let setting = line.split(" = ").next().unwrap();
        let bad = VALID_CONFIG.replace(line, &format!("{setting} = {over}"));
        let err = AppConfig::load_from_str(&bad).unwrap_err();
        assert!(err.to_string().contains(key), "{key}: {err}");
        assert!(err.to_string().contains("<="), "{key}: {err}");
    }

    let bad = VALID_CONFIG.replace(
        "broadcast_capacity = 16",
        &format!("broadcast_capacity = 16\nstats_log_interval_secs = {over}"),
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sync.stats_log_interval_secs"));
}

#[test]
fn test_config_accepts_interval_at_bound() {
    let cfg = VALID_CONFIG
        .replace("refresh_interval_secs = 30", &format!("refresh_interval_secs = {MAX_INTERVAL_SECS}"))
        .replace("online_threshold_secs = 600", &format!("online_threshold_secs = {MAX_INTERVAL_SECS}"));
    let config = AppConfig::load_from_str(&cfg).expect("load_from_str");
    assert_eq!(config.sync.refresh_interval_secs, MAX_INTERVAL_SECS);
    assert_eq!(config.sync.online_threshold_secs, MAX_INTERVAL_SECS);
}

#[test]
fn test_config_validation_rejects_stats_log_interval_zero() {
    let bad = VALID_CONFIG.replace(
        "broadcast_capacity = 16",
        "broadcast_capacity = 16\nstats_log_interval_secs = 0",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sync.stats_log_interval_secs"));
}

#[test]
fn test_config_validation_rejects_broadcast_capacity_zero() {
    let bad = VALID_CONFIG.replace("broadcast_capacity = 16", "broadcast_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("broadcast_capacity"));
}

#[test]
fn test_config_validation_rejects_out_of_range_offset() {
    let bad = VALID_CONFIG.replace("utc_offset_minutes = 360", "utc_offset_minutes = 900");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("meter.utc_offset_minutes"));
}

#[test]
fn test_config_rejects_unknown_source_kind() {
    let bad = VALID_CONFIG.replace("kind = \"sheets\"", "kind = \"ftp\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_snapshot_kind_needs_no_credentials() {
    let config = AppConfig::load_from_str(SNAPSHOT_CONFIG).expect("load_from_str");
    assert!(config.source.sheet_id.is_empty());
    assert!(config.source.api_key.is_empty());
}

// Both env vars in one test: tests in this binary run in parallel and share the process env.
#[test]
fn test_config_load_from_file_with_api_key_override() {
    let without_key = VALID_CONFIG.replace("api_key = \"test-key\"\n", "");
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(without_key.as_bytes()).expect("write config");

    unsafe {
        std::env::set_var("CONFIG_FILE", file.path());
        std::env::set_var("SHEETS_API_KEY", "from-env");
    }
    let loaded = AppConfig::load();
    unsafe {
        std::env::remove_var("CONFIG_FILE");
        std::env::remove_var("SHEETS_API_KEY");
    }

    let config = loaded.expect("load");
    assert_eq!(config.source.api_key, "from-env");
    assert_eq!(config.server.port, 8081);
}
