// Synchronization engine: polls the data source, caches latest/all/today/historical views,
// and tracks device liveness. One poll task owns all timers (start/stop).
//
// Every fetch takes a tag from one monotonic counter; each view remembers the tag that last
// wrote it, so a slow completion can never overwrite a newer one.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast, oneshot};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{Instrument, instrument};

use crate::config::{MAX_INTERVAL_SECS, MeterConfig, OfflineReading, SyncSettings};
use crate::filter;
use crate::models::{LiveUpdate, Reading};
use crate::parser::RowParser;
use crate::source::DataSource;

/// Engine timing and policy.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub refresh_interval: Duration,
    pub liveness_interval: Duration,
    pub online_threshold: TimeDelta,
    pub refresh_today_on_tick: bool,
    pub offline_reading: OfflineReading,
    pub stats_log_interval: Duration,
    pub broadcast_capacity: usize,
    /// Meter wall-clock zone for naive timestamps and calendar dates.
    pub zone: FixedOffset,
}

impl SyncConfig {
    pub fn from_settings(sync: &SyncSettings, meter: &MeterConfig) -> Self {
        Self {
            refresh_interval: Duration::from_secs(sync.refresh_interval_secs),
            liveness_interval: Duration::from_secs(sync.liveness_interval_secs),
            online_threshold: i64::try_from(sync.online_threshold_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            refresh_today_on_tick: sync.refresh_today_on_tick,
            offline_reading: sync.offline_reading,
            stats_log_interval: Duration::from_secs(sync.stats_log_interval_secs),
            broadcast_capacity: sync.broadcast_capacity,
            zone: meter.zone(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default(), &MeterConfig::default())
    }
}

/// `now - latest <= threshold` (inclusive).
pub fn is_online(latest: DateTime<Utc>, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
    now - latest <= threshold
}

/// Chronologically last reading; on equal timestamps the later one in the sequence wins.
pub fn latest_reading(readings: &[Reading]) -> Option<&Reading> {
    readings
        .iter()
        .reduce(|best, r| if r.time >= best.time { r } else { best })
}

/// Read-only copy of the engine's views.
#[derive(Debug, Clone)]
pub struct SyncView {
    pub current_reading: Option<Reading>,
    pub historical_readings: Arc<[Reading]>,
    pub all_readings: Arc<[Reading]>,
    pub today_readings: Arc<[Reading]>,
    pub is_online: bool,
    pub is_loading: bool,
    pub selected_date: NaiveDate,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub fetches_ok: u64,
    pub fetches_failed: u64,
    pub stale_discarded: u64,
}

#[derive(Debug, Clone, Copy)]
enum ViewKind {
    Current,
    All,
    Today,
    Historical,
}

struct SyncState {
    current: Option<Reading>,
    all: Arc<[Reading]>,
    today: Arc<[Reading]>,
    historical: Arc<[Reading]>,
    /// Time of the latest reading from the last *successful* latest-refresh.
    last_seen: Option<DateTime<Utc>>,
    selected_date: NaiveDate,
    is_online: bool,
    last_sync: Option<DateTime<Utc>>,
    current_tag: u64,
    all_tag: u64,
    today_tag: u64,
    historical_tag: u64,
}

impl SyncState {
    fn new(selected_date: NaiveDate) -> Self {
        Self {
            current: None,
            all: Arc::from(Vec::new()),
            today: Arc::from(Vec::new()),
            historical: Arc::from(Vec::new()),
            last_seen: None,
            selected_date,
            is_online: false,
            last_sync: None,
            current_tag: 0,
            all_tag: 0,
            today_tag: 0,
            historical_tag: 0,
        }
    }

    /// Claims `kind` for the completion tagged `tag`; false if a newer one already wrote it.
    fn accept(&mut self, kind: ViewKind, tag: u64) -> bool {
        let slot = match kind {
            ViewKind::Current => &mut self.current_tag,
            ViewKind::All => &mut self.all_tag,
            ViewKind::Today => &mut self.today_tag,
            ViewKind::Historical => &mut self.historical_tag,
        };
        if tag <= *slot {
            return false;
        }
        *slot = tag;
        true
    }
}

#[derive(Debug, Default)]
struct Counters {
    fetches_ok: AtomicU64,
    fetches_failed: AtomicU64,
    stale_discarded: AtomicU64,
}

/// Marks a fetch in flight for `is_loading`; decrements on drop.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Poller {
    shutdown_tx: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct SyncEngine {
    source: Arc<dyn DataSource>,
    config: SyncConfig,
    parser: RowParser,
    state: RwLock<SyncState>,
    next_tag: AtomicU64,
    in_flight: AtomicUsize,
    counters: Counters,
    updates: broadcast::Sender<LiveUpdate>,
    clock: Clock,
    poller: Mutex<Option<Poller>>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn DataSource>, config: SyncConfig) -> Self {
        let clock: Clock = Arc::new(Utc::now);
        let today = clock().with_timezone(&config.zone).date_naive();
        let (updates, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            source,
            parser: RowParser::new(config.zone),
            state: RwLock::new(SyncState::new(today)),
            next_tag: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            counters: Counters::default(),
            updates,
            clock,
            poller: Mutex::new(None),
            config,
        }
    }

    /// Replaces the wall clock (tests).
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn zone(&self) -> FixedOffset {
        self.config.zone
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.config.zone).date_naive()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.updates.subscribe()
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            fetches_ok: self.counters.fetches_ok.load(Ordering::Relaxed),
            fetches_failed: self.counters.fetches_failed.load(Ordering::Relaxed),
            stale_discarded: self.counters.stale_discarded.load(Ordering::Relaxed),
        }
    }

    pub async fn view(&self) -> SyncView {
        let state = self.state.read().await;
        SyncView {
            current_reading: state.current.clone(),
            historical_readings: state.historical.clone(),
            all_readings: state.all.clone(),
            today_readings: state.today.clone(),
            is_online: state.is_online,
            is_loading: self.in_flight.load(Ordering::SeqCst) > 0,
            selected_date: state.selected_date,
            last_sync: state.last_sync,
        }
    }

    fn take_tag(&self) -> u64 {
        self.next_tag.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// One tagged fetch + parse. `None` when the source had no data.
    async fn fetch(&self) -> (u64, Option<Vec<Reading>>) {
        let tag = self.take_tag();
        (tag, self.fetch_rows().await)
    }

    async fn fetch_rows(&self) -> Option<Vec<Reading>> {
        let _loading = LoadingGuard::new(&self.in_flight);
        match self.source.fetch_all_rows().await {
            Some(rows) => {
                self.counters.fetches_ok.fetch_add(1, Ordering::Relaxed);
                Some(self.parser.parse_rows(&rows))
            }
            None => {
                self.counters.fetches_failed.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn discard_stale(&self, tag: u64, kind: ViewKind) {
        self.counters.stale_discarded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(tag, view = ?kind, "discarding out-of-order completion");
    }

    /// Fetches and takes the chronologically last reading as current; recomputes liveness.
    #[instrument(skip(self), fields(operation = "refresh_latest"))]
    pub async fn refresh_latest(&self) {
        let (tag, readings) = self.fetch().await;
        let latest = readings.as_deref().and_then(latest_reading).cloned();
        let now = self.now();

        let mut state = self.state.write().await;
        if !state.accept(ViewKind::Current, tag) {
            self.discard_stale(tag, ViewKind::Current);
            return;
        }
        match latest {
            Some(reading) => {
                state.is_online = is_online(reading.time, now, self.config.online_threshold);
                state.last_seen = Some(reading.time);
                state.current = Some(reading);
                state.last_sync = Some(now);
            }
            None => {
                state.is_online = false;
                state.last_seen = None;
                if self.config.offline_reading == OfflineReading::Zero {
                    let zeroed = state.current.as_ref().map(|r| Reading::zeroed(r.time));
                    if zeroed.is_some() {
                        state.current = zeroed;
                    }
                }
                tracing::debug!("no data; device marked offline");
            }
        }
        let update = LiveUpdate {
            timestamp: now,
            is_online: state.is_online,
            current: state.current.clone(),
        };
        drop(state);
        // No subscribers is the normal case without /ws/live clients.
        let _ = self.updates.send(update);
    }

    /// Replaces the full cached sequence, sorted ascending by time.
    /// A failed fetch keeps the last good set (empty until the first success).
    #[instrument(skip(self), fields(operation = "refresh_all"))]
    pub async fn refresh_all(&self) {
        let (tag, readings) = self.fetch().await;
        let now = self.now();

        let mut state = self.state.write().await;
        if !state.accept(ViewKind::All, tag) {
            self.discard_stale(tag, ViewKind::All);
            return;
        }
        let Some(mut readings) = readings else {
            tracing::debug!(kept = state.all.len(), "no data; keeping all readings");
            return;
        };
        readings.sort_by_key(|r| r.time);
        tracing::debug!(count = readings.len(), "all readings replaced");
        state.all = readings.into();
        state.last_sync = Some(now);
    }

    /// Readings from today's calendar date in the meter zone. A failed fetch keeps the
    /// cached rows that still fall on today.
    #[instrument(skip(self), fields(operation = "refresh_today"))]
    pub async fn refresh_today(&self) {
        let (tag, readings) = self.fetch().await;
        let today = self.today();
        let fresh = readings.map(|r| self.on_date(r, today));

        let mut state = self.state.write().await;
        if !state.accept(ViewKind::Today, tag) {
            self.discard_stale(tag, ViewKind::Today);
            return;
        }
        state.today = match fresh {
            Some(readings) => readings.into(),
            None => filter::on_date(&state.today, today, self.config.zone).into(),
        };
    }

    /// Selects `date` and loads its readings into the historical view.
    #[instrument(skip(self), fields(operation = "load_historical"))]
    pub async fn load_historical(&self, date: NaiveDate) -> Arc<[Reading]> {
        // selection and tag are taken together, so the latest selection's fetch wins
        let tag = {
            let mut state = self.state.write().await;
            state.selected_date = date;
            self.take_tag()
        };
        let readings = self.fetch_rows().await;
        let day: Arc<[Reading]> = readings
            .map(|r| self.on_date(r, date))
            .unwrap_or_default()
            .into();

        let mut state = self.state.write().await;
        if state.accept(ViewKind::Historical, tag) {
            state.historical = day.clone();
        } else {
            self.discard_stale(tag, ViewKind::Historical);
        }
        day
    }

    /// Consumer-facing refresh: re-reads the current reading.
    pub async fn refresh(&self) {
        self.refresh_latest().await;
    }

    pub async fn load_all(&self) {
        self.refresh_all().await;
    }

    pub async fn load_today(&self) {
        self.refresh_today().await;
    }

    /// Re-evaluates liveness from the last successfully seen timestamp, without fetching.
    pub async fn check_liveness(&self) -> bool {
        let now = self.now();
        let mut state = self.state.write().await;
        state.is_online = state
            .last_seen
            .is_some_and(|t| is_online(t, now, self.config.online_threshold));
        state.is_online
    }

    fn on_date(&self, mut readings: Vec<Reading>, date: NaiveDate) -> Vec<Reading> {
        readings.sort_by_key(|r| r.time);
        filter::on_date(&readings, date, self.config.zone)
    }

    /// Initial load (all + latest), then spawns the poll task. No-op when already running.
    pub async fn start(self: &Arc<Self>) {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return;
        }
        tokio::join!(self.refresh_all(), self.refresh_latest());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let span = tracing::debug_span!("sync", backend = self.source.name());
        let handle = tokio::spawn(poll_loop(self.clone(), shutdown_rx).instrument(span));
        *poller = Some(Poller {
            shutdown_tx,
            handle,
        });
        tracing::info!(
            refresh_interval_secs = self.config.refresh_interval.as_secs(),
            liveness_interval_secs = self.config.liveness_interval.as_secs(),
            "sync engine started"
        );
    }

    /// Cancels every timer and waits for the poll task. Idempotent.
    pub async fn stop(&self) {
        let Some(poller) = self.poller.lock().await.take() else {
            return;
        };
        let _ = poller.shutdown_tx.send(());
        if let Err(e) = poller.handle.await {
            tracing::warn!(error = %e, "sync poll task ended abnormally");
        }
        tracing::info!("sync engine stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.poller.lock().await.is_some()
    }
}

/// First tick one full period after `start`; the period is clamped to 1 ms ..= one year.
fn ticker(start: Instant, period: Duration) -> Interval {
    let period = period.clamp(Duration::from_millis(1), Duration::from_secs(MAX_INTERVAL_SECS));
    let mut tick = interval_at(start + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}

async fn poll_loop(engine: Arc<SyncEngine>, mut shutdown_rx: oneshot::Receiver<()>) {
    let config = engine.config.clone();
    let start = Instant::now();

    let mut refresh_tick = ticker(start, config.refresh_interval);
    let mut liveness_tick = ticker(start, config.liveness_interval);
    let mut stats_log_tick = ticker(start, config.stats_log_interval);

    loop {
        tokio::select! {
            _ = refresh_tick.tick() => {
                if config.refresh_today_on_tick {
                    tokio::join!(engine.refresh_latest(), engine.refresh_today());
                } else {
                    engine.refresh_latest().await;
                }
            }
            _ = liveness_tick.tick() => {
                let online = engine.check_liveness().await;
                tracing::debug!(online, "liveness re-checked");
            }
            _ = stats_log_tick.tick() => {
                let stats = engine.stats();
                tracing::info!(
                    fetches_ok = stats.fetches_ok,
                    fetches_failed = stats.fetches_failed,
                    stale_discarded = stats.stale_discarded,
                    ws_live_clients = engine.updates.receiver_count(),
                    "sync stats"
                );
            }
            _ = &mut shutdown_rx => {
                tracing::debug!("sync poll task shutting down");
                break;
            }
        }
    }
}
