//! Polling coordinator
//!
//! Owns the last-known-good [`RawSnapshot`] of one softener and refreshes it
//! on a fixed interval or on demand. At most one fetch is in flight at any
//! time: concurrent `refresh()` callers join the running fetch and all get
//! its outcome. A failed fetch leaves the stored snapshot untouched.

use crate::client::DeviceClient;
use crate::error::{Result, SoftenerError};
use crate::models::RawSnapshot;
use crate::readings::{self, DerivedReading, ReadingKey};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type FetchOutcome = std::result::Result<Arc<RawSnapshot>, Arc<SoftenerError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Outcome bookkeeping of past updates
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatus {
    /// False after a failed update, until the next success
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl Default for UpdateStatus {
    fn default() -> Self {
        Self {
            last_update_success: true,
            last_error: None,
            last_success_at: None,
            consecutive_failures: 0,
        }
    }
}

/// Polling coordinator for one device
pub struct PollingCoordinator {
    /// Name used in logs and update-failure messages
    name: String,
    update_interval: Duration,
    client: RwLock<Option<Arc<dyn DeviceClient>>>,
    snapshot: watch::Sender<Option<Arc<RawSnapshot>>>,
    status: RwLock<UpdateStatus>,
    in_flight: Mutex<Option<SharedFetch>>,
    fetch_count: AtomicU64,
    ready: AtomicBool,
    scheduled: AtomicBool,
    shutdown: CancellationToken,
}

impl PollingCoordinator {
    /// Create a new coordinator
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn DeviceClient>,
        update_interval: Duration,
    ) -> Arc<Self> {
        let (snapshot, _) = watch::channel(None);
        Arc::new(Self {
            name: name.into(),
            update_interval,
            client: RwLock::new(Some(client)),
            snapshot,
            status: RwLock::new(UpdateStatus::default()),
            in_flight: Mutex::new(None),
            fetch_count: AtomicU64::new(0),
            ready: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Device name used in logs and error messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Period of the fixed schedule
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Fetch a fresh snapshot, or join the fetch already in flight
    pub async fn refresh(self: &Arc<Self>) -> Result<Arc<RawSnapshot>> {
        if self.shutdown.is_cancelled() {
            return Err(SoftenerError::ShutDown);
        }

        let fetch = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(fetch) => {
                    debug!("Joining in-flight {} fetch", self.name);
                    fetch.clone()
                }
                None => {
                    let fetch = self.spawn_fetch().await?;
                    *slot = Some(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await.map_err(|cause| {
            if matches!(*cause, SoftenerError::ShutDown) {
                SoftenerError::ShutDown
            } else {
                SoftenerError::update_failed(&self.name, cause)
            }
        })
    }

    /// Start the fetch on a worker task; the in-flight slot must be locked
    async fn spawn_fetch(self: &Arc<Self>) -> Result<SharedFetch> {
        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or(SoftenerError::ShutDown)?;

        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = client.fetch().await;
            coordinator.complete_fetch(outcome, started.elapsed()).await
        });

        Ok(async move {
            handle.await.unwrap_or_else(|e| {
                Err(Arc::new(SoftenerError::internal(format!(
                    "Fetch task failed: {e}"
                ))))
            })
        }
        .boxed()
        .shared())
    }

    /// Store the outcome of a finished fetch and free the in-flight slot
    async fn complete_fetch(
        &self,
        outcome: Result<RawSnapshot>,
        elapsed: Duration,
    ) -> FetchOutcome {
        let result = {
            // shutdown() cancels under the write lock, so no snapshot lands after it
            let _client = self.client.read().await;
            if self.shutdown.is_cancelled() {
                debug!("Discarding {} fetch result after shutdown", self.name);
                Err(Arc::new(SoftenerError::ShutDown))
            } else {
                match outcome {
                    Ok(snapshot) => {
                        let snapshot = Arc::new(snapshot);
                        self.record_success(elapsed).await;
                        self.snapshot.send_replace(Some(snapshot.clone()));
                        Ok(snapshot)
                    }
                    Err(error) => {
                        let error = Arc::new(error);
                        self.record_failure(&error).await;
                        Err(error)
                    }
                }
            }
        };

        *self.in_flight.lock().await = None;
        result
    }

    async fn record_success(&self, elapsed: Duration) {
        let mut status = self.status.write().await;
        if !status.last_update_success {
            info!("Fetching {} data recovered", self.name);
        }
        debug!("Finished fetching {} data in {:?}", self.name, elapsed);
        status.last_update_success = true;
        status.last_error = None;
        status.last_success_at = Some(Utc::now());
        status.consecutive_failures = 0;
    }

    async fn record_failure(&self, error: &SoftenerError) {
        let mut status = self.status.write().await;
        if status.last_update_success {
            warn!("Error fetching {} data: {}", self.name, error.sanitized_message());
        } else {
            debug!("Error fetching {} data: {}", self.name, error);
        }
        status.last_update_success = false;
        status.last_error = Some(error.to_string());
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
    }

    /// First refresh after setup; failure means the host should retry setup later
    pub async fn first_refresh(self: &Arc<Self>) -> Result<Arc<RawSnapshot>> {
        match self.refresh().await {
            Ok(snapshot) => {
                self.ready.store(true, Ordering::SeqCst);
                info!("{} coordinator ready", self.name);
                Ok(snapshot)
            }
            Err(error) => Err(SoftenerError::NotReady(Box::new(error))),
        }
    }

    /// Stored snapshot, without fetching
    pub fn current(&self) -> Option<Arc<RawSnapshot>> {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every stored snapshot
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RawSnapshot>>> {
        self.snapshot.subscribe()
    }

    /// First refresh has succeeded
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Last update succeeded and a snapshot is available
    pub async fn is_available(&self) -> bool {
        self.status.read().await.last_update_success && self.current().is_some()
    }

    /// Snapshot of the update bookkeeping
    pub async fn status(&self) -> UpdateStatus {
        self.status.read().await.clone()
    }

    /// Number of fetches issued against the device
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Derive one reading from the stored snapshot at the current wall-clock time
    pub fn reading(&self, key: ReadingKey) -> Result<DerivedReading> {
        let snapshot = self.current().ok_or(SoftenerError::NoSnapshot)?;
        Ok(readings::derive(key, &snapshot, Utc::now()))
    }

    /// Derive every reading from the stored snapshot
    pub fn readings(&self) -> Result<Vec<DerivedReading>> {
        let snapshot = self.current().ok_or(SoftenerError::NoSnapshot)?;
        Ok(readings::derive_all(&snapshot, Utc::now()))
    }

    /// Start the fixed-interval schedule; the first tick is one interval away
    ///
    /// A coordinator runs at most one schedule. Later calls log a warning and
    /// return a handle to a task that finishes immediately.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        if self.scheduled.swap(true, Ordering::SeqCst) {
            warn!("{} schedule already running", self.name);
            return tokio::spawn(async {});
        }

        let coordinator = self.clone();
        tokio::spawn(async move {
            // interval_at panics on a zero period
            let period = coordinator.update_interval.max(Duration::from_millis(1));
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = coordinator.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = coordinator.refresh().await {
                            debug!("Scheduled {} refresh failed: {}", coordinator.name, e);
                        }
                    }
                }
            }

            debug!("{} schedule stopped", coordinator.name);
        })
    }

    /// Stop the schedule and release the device client
    pub async fn shutdown(&self) {
        let mut client = self.client.write().await;
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        client.take();
        drop(client);
        info!("{} coordinator shut down", self.name);
    }

    /// `shutdown()` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
