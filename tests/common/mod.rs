// Shared test helpers: reading/row builders, a scriptable data source, a local HTTP server
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meterwatch::models::{PowerFactorClass, Reading};
use meterwatch::source::{DataSource, RawRow};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::{oneshot, watch};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Healthy reading at `time` with the given active power.
pub fn reading(time: &str, active_power: f64) -> Reading {
    let mut r = Reading::zeroed(ts(time));
    r.voltage = 230.0;
    r.frequency = 50.0;
    r.current = 0.5;
    r.active_power = active_power;
    r.power_factor = 0.9;
    r.power_factor_class = PowerFactorClass::from_power_factor(0.9);
    r
}

/// Full 15-cell sheet row.
pub fn row(time: &str, compressor: &str, voltage: f64, active_power: f64, cost: f64) -> RawRow {
    vec![
        json!(time),
        json!(compressor),
        json!(voltage),
        json!(50.0),
        json!(0.6),
        json!(active_power),
        json!(0.92),
        json!(0.15),
        json!(0.05),
        json!(12.5),
        json!(cost),
        json!(""),
        json!(""),
        json!(45.0),
        json!(3),
    ]
}

/// Four rows on 2024-05-01, five minutes apart, compressor alternating ON/OFF.
pub fn day_rows() -> Vec<RawRow> {
    vec![
        row("2024-05-01 10:00:00", "ON", 229.0, 0.10, 100.0),
        row("2024-05-01 10:05:00", "OFF", 231.0, 0.10, 100.5),
        row("2024-05-01 10:10:00", "ON", 230.0, 0.20, 101.0),
        row("2024-05-01 10:15:00", "OFF", 230.0, 0.20, 101.5),
    ]
}

/// `{"values": [header, rows...]}` body as the spreadsheet API returns it.
pub fn values_body(rows: &[RawRow]) -> Value {
    let mut values = vec![json!([
        "Time", "Compressor", "Voltage", "Frequency", "Current", "ActivePower", "PowerFactor",
        "ApparentPower", "ReactivePower", "Energy", "Cost", "dE", "VoltDev", "Duty24h", "Cycle"
    ])];
    values.extend(rows.iter().map(|r| Value::Array(r.clone())));
    json!({ "range": "ProcessedData!A1:O100", "majorDimension": "ROWS", "values": values })
}

struct Scripted {
    gate: Option<oneshot::Receiver<()>>,
    rows: Option<Vec<RawRow>>,
}

/// Data source answering from a script, falling back to a fixed response.
/// Gated responses block until their sender fires.
pub struct FakeSource {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<Vec<RawRow>>>,
    calls: watch::Sender<usize>,
}

impl FakeSource {
    pub fn new(fallback: Option<Vec<RawRow>>) -> Self {
        let (calls, _) = watch::channel(0);
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls,
        }
    }

    pub fn set_fallback(&self, rows: Option<Vec<RawRow>>) {
        *self.fallback.lock().unwrap() = rows;
    }

    pub fn push(&self, rows: Option<Vec<RawRow>>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted { gate: None, rows });
    }

    pub fn push_gated(&self, rows: Option<Vec<RawRow>>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().push_back(Scripted {
            gate: Some(rx),
            rows,
        });
        tx
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|c| *c >= n).await;
    }
}

#[async_trait]
impl DataSource for FakeSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_all_rows(&self) -> Option<Vec<RawRow>> {
        let next = self.script.lock().unwrap().pop_front();
        self.calls.send_modify(|c| *c += 1);
        match next {
            Some(Scripted { gate, rows }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                rows
            }
            None => self.fallback.lock().unwrap().clone(),
        }
    }
}

/// Serves `router` on an ephemeral local port; returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
