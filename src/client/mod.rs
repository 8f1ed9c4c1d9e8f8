//! Device client implementations
//!
//! The coordinator only needs one operation from a device: fetch a fresh
//! snapshot. Async clients implement [`DeviceClient`] directly; blocking
//! vendor libraries implement [`BlockingDeviceClient`] and are wrapped in
//! [`Offloaded`] so the fetch runs on the blocking pool.

pub mod http_client;

pub use http_client::HttpDeviceClient;

use crate::error::{Result, SoftenerError};
use crate::models::RawSnapshot;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for softener device clients
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Fetch one snapshot from the device
    async fn fetch(&self) -> Result<RawSnapshot>;
}

/// A client whose fetch blocks the calling thread
pub trait BlockingDeviceClient: Send + Sync + 'static {
    fn fetch_blocking(&self) -> Result<RawSnapshot>;
}

/// Runs a [`BlockingDeviceClient`] on tokio's blocking pool
pub struct Offloaded<C> {
    inner: Arc<C>,
}

impl<C: BlockingDeviceClient> Offloaded<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<C: BlockingDeviceClient> DeviceClient for Offloaded<C> {
    async fn fetch(&self) -> Result<RawSnapshot> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.fetch_blocking())
            .await
            .map_err(|e| SoftenerError::internal(format!("Blocking fetch task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceState, VolumeUnit};
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowVendorClient {
        calls: AtomicUsize,
    }

    impl BlockingDeviceClient for SlowVendorClient {
        fn fetch_blocking(&self) -> Result<RawSnapshot> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            if call > 0 {
                return Err(SoftenerError::connection("vendor library gave up"));
            }
            Ok(RawSnapshot {
                state: DeviceState::Ready,
                device_time: DateTime::parse_from_rfc3339("2024-06-10T08:00:00+02:00").unwrap(),
                days_since_last_regeneration: 1,
                out_of_salt_estimated_days: 30,
                salt_level_percent: Some(80),
                volume_unit: VolumeUnit::Gallons,
                total_water_available: 120.0,
                today_use: 12.0,
                average_daily_use: 40.0,
                current_water_flow: 0.0,
            })
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_offloaded_runs_blocking_fetch() {
        let client = Offloaded::new(SlowVendorClient {
            calls: AtomicUsize::new(0),
        });

        let snapshot = client.fetch().await.unwrap();
        assert_eq!(snapshot.volume_unit, VolumeUnit::Gallons);

        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, SoftenerError::Connection(_)));
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 2);
    }
}
