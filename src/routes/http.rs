// GET/POST handlers: version, status, readings, analytics, historical, refresh

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::analytics;
use crate::filter;
use crate::models::{
    Advisory, AnalyticsSnapshot, Anomaly, CompressorStatus, CostProjection, DateRange,
    DeviationBin, FilterSpec, PowerRange, RangeSummary, Reading,
};
use crate::parser::{local_to_utc, parse_timestamp_str};
use crate::sync::{SyncEngine, SyncStats, SyncView};

type ApiError = (StatusCode, String);

fn bad_request(msg: String) -> ApiError {
    (StatusCode::BAD_REQUEST, msg)
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StatusResponse {
    is_online: bool,
    is_loading: bool,
    selected_date: NaiveDate,
    last_sync: Option<DateTime<Utc>>,
    all_count: usize,
    today_count: usize,
    historical_count: usize,
    stats: SyncStats,
}

fn status_of(view: &SyncView, engine: &SyncEngine) -> StatusResponse {
    StatusResponse {
        is_online: view.is_online,
        is_loading: view.is_loading,
        selected_date: view.selected_date,
        last_sync: view.last_sync,
        all_count: view.all_readings.len(),
        today_count: view.today_readings.len(),
        historical_count: view.historical_readings.len(),
        stats: engine.stats(),
    }
}

/// GET /api/status
pub(super) async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let view = state.engine.view().await;
    Json(status_of(&view, &state.engine))
}

/// GET /api/current: latest reading, or null before the first successful fetch.
pub(super) async fn current_handler(State(state): State<AppState>) -> Json<Option<Reading>> {
    Json(state.engine.view().await.current_reading)
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum ReadingsView {
    #[default]
    All,
    Today,
    Historical,
}

/// Flat query form of a FilterSpec plus which cached view to filter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReadingsQuery {
    #[serde(default)]
    view: ReadingsView,
    search: Option<String>,
    start: Option<String>,
    end: Option<String>,
    min_power: Option<f64>,
    max_power: Option<f64>,
    #[serde(default)]
    compressor: CompressorStatus,
}

impl ReadingsQuery {
    fn to_filter(&self, zone: FixedOffset) -> Result<FilterSpec, ApiError> {
        let start = self
            .start
            .as_deref()
            .map(|s| parse_bound(s, zone, false))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|s| parse_bound(s, zone, true))
            .transpose()?;
        Ok(FilterSpec {
            search_text: self.search.clone().unwrap_or_default(),
            date_range: DateRange { start, end },
            power_range: PowerRange {
                min: self.min_power,
                max: self.max_power,
            },
            compressor_status: self.compressor,
        })
    }
}

/// A bare `YYYY-MM-DD` end bound covers that whole day.
fn parse_bound(s: &str, zone: FixedOffset, is_end: bool) -> Result<DateTime<Utc>, ApiError> {
    let end_of_day = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .filter(|_| is_end);
    if let Some(date) = end_of_day {
        return date
            .and_hms_milli_opt(23, 59, 59, 999)
            .and_then(|naive| local_to_utc(naive, zone))
            .ok_or_else(|| bad_request(format!("invalid end date: {s}")));
    }
    parse_timestamp_str(s, zone).ok_or_else(|| bad_request(format!("invalid timestamp: {s}")))
}

async fn filtered(state: &AppState, query: &ReadingsQuery) -> Result<Vec<Reading>, ApiError> {
    let zone = state.engine.zone();
    let spec = query.to_filter(zone)?;
    let view = state.engine.view().await;
    let source: Arc<[Reading]> = match query.view {
        ReadingsView::All => view.all_readings,
        ReadingsView::Today => view.today_readings,
        ReadingsView::Historical => view.historical_readings,
    };
    Ok(filter::apply(&source, &spec, zone))
}

/// GET /api/readings: filtered readings from one cached view.
pub(super) async fn readings_handler(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    filtered(&state, &query).await.map(Json)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AdvisoryView {
    kind: Advisory,
    message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AnalyticsResponse {
    reading_count: usize,
    snapshot: AnalyticsSnapshot,
    cost_projection: CostProjection,
    range_summary: RangeSummary,
    energy_by_hour: [f64; 24],
    voltage_deviation: Vec<DeviationBin>,
    advisories: Vec<AdvisoryView>,
    anomalies: Vec<Anomaly>,
}

/// GET /api/analytics: derived metrics over the filtered readings.
pub(super) async fn analytics_handler(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let readings = filtered(&state, &query).await?;
    let zone = state.engine.zone();
    let snapshot = analytics::compute_snapshot(&readings);
    let advisories = analytics::advisories(&readings, &snapshot, zone)
        .into_iter()
        .map(|kind| AdvisoryView {
            kind,
            message: kind.message(),
        })
        .collect();
    Ok(Json(AnalyticsResponse {
        reading_count: readings.len(),
        cost_projection: analytics::project_cost(&readings),
        range_summary: analytics::range_summary(&readings),
        energy_by_hour: analytics::energy_by_hour(&readings, zone),
        voltage_deviation: analytics::voltage_deviation_histogram(
            &readings,
            analytics::NOMINAL_VOLTAGE,
            analytics::DEVIATION_BINS,
        ),
        anomalies: analytics::detect_anomalies(&readings),
        advisories,
        snapshot,
    }))
}

/// GET /api/historical/{date}: selects the date and returns its readings.
pub(super) async fn historical_handler(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| bad_request(format!("invalid date {date:?}: {e}")))?;
    let readings = state.engine.load_historical(date).await;
    Ok(Json(readings.to_vec()))
}

/// POST /api/refresh: re-fetches latest and all, then reports status.
pub(super) async fn refresh_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    tokio::join!(state.engine.refresh_latest(), state.engine.refresh_all());
    let view = state.engine.view().await;
    Json(status_of(&view, &state.engine))
}
