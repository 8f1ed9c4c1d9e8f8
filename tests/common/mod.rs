//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::DateTime;
use iqua_softener::{DeviceClient, DeviceState, RawSnapshot, Result, VolumeUnit};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

/// Snapshot as a liter-based device reports it
pub fn liter_snapshot(total_water_available: f64) -> RawSnapshot {
    RawSnapshot {
        state: DeviceState::Ready,
        device_time: DateTime::parse_from_rfc3339("2024-06-10T08:00:00+02:00").unwrap(),
        days_since_last_regeneration: 2,
        out_of_salt_estimated_days: -3,
        salt_level_percent: Some(42),
        volume_unit: VolumeUnit::Liters,
        total_water_available,
        today_use: 1500.0,
        average_daily_use: 280.0,
        current_water_flow: 4.2,
    }
}

/// Same readings from a gallon-based device
pub fn gallon_snapshot() -> RawSnapshot {
    RawSnapshot {
        volume_unit: VolumeUnit::Gallons,
        total_water_available: 210.0,
        today_use: 14.0,
        average_daily_use: 61.5,
        current_water_flow: 1.1,
        ..liter_snapshot(0.0)
    }
}

/// Wire form of [`liter_snapshot`]
pub fn wire_snapshot() -> serde_json::Value {
    serde_json::json!({
        "state": "READY",
        "device_time": "2024-06-10T08:00:00+02:00",
        "days_since_last_regeneration": 2,
        "out_of_salt_estimated_days": -3,
        "salt_level_percent": 42,
        "volume_unit": "liters",
        "total_water_available": 45000,
        "today_use": 1500,
        "average_daily_use": 280,
        "current_water_flow": 4.2
    })
}

/// Device client replaying a fixed script of outcomes
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<RawSnapshot>>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
    started: Notify,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<RawSnapshot>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            gate: None,
            started: Notify::new(),
        })
    }

    /// Every fetch blocks until [`ScriptedClient::release`] is called
    pub fn gated(script: Vec<Result<RawSnapshot>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            gate: Some(Semaphore::new(0)),
            started: Notify::new(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until a fetch has entered the client
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let one held fetch finish
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }
}

#[async_trait]
impl DeviceClient for ScriptedClient {
    async fn fetch(&self) -> Result<RawSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(iqua_softener::SoftenerError::connection("script exhausted")))
    }
}
