//! Beacon listening service: owns the scanner, duty-cycle scheduler,
//! frame decoding, connection tracking and alerting, and exposes the
//! latest measurement plus a subscription point to its host.
//!
//! All advertisement processing happens on one consumer task draining
//! the scanner stream, so measurements reach the subscriber in the
//! order their scan results were processed. Listener delivery goes
//! through channels; nothing UI-facing runs on the consumer task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use aero_beacon::{AdvertisementFrame, Measurement};

use crate::alert::{AlertEvaluator, AlertSink};
use crate::config::NodeConfig;
use crate::connection::{ConnectionEvent, ConnectionStateTracker, ConnectionStatus};
use crate::error::{Result, ScanError, ServiceError};
use crate::location::LocationProvider;
use crate::scanner::{Advertisement, BeaconScanner};
use crate::scheduler::ScanScheduler;
use crate::uplink::MeasurementUplink;

/// Grace period for the consumer task to drain in-flight work on stop.
const STOP_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Initialized,
    Running,
    Stopped,
}

/// Drop/accept counters for the scan-result pipeline.
#[derive(Default)]
pub struct PipelineStats {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    decode_failures: AtomicU64,
    filtered_out: AtomicU64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::SeqCst),
            duplicates: self.duplicates.load(Ordering::SeqCst),
            decode_failures: self.decode_failures.load(Ordering::SeqCst),
            filtered_out: self.filtered_out.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub duplicates: u64,
    pub decode_failures: u64,
    pub filtered_out: u64,
}

/// Everything the consumer task needs, clone-cheap.
#[derive(Clone)]
struct Pipeline {
    target: Arc<Mutex<String>>,
    latest: Arc<RwLock<Option<Measurement>>>,
    subscriber: Arc<Mutex<Option<mpsc::UnboundedSender<Measurement>>>>,
    tracker: Arc<ConnectionStateTracker>,
    location: Arc<dyn LocationProvider>,
    uplink: Arc<dyn MeasurementUplink>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// One scan result through decode, filter, dedup and fan-out.
    /// Every per-record failure is recovered here; nothing escapes to
    /// the consumer loop.
    async fn process<A: AlertSink>(
        &self,
        alerts: &AlertEvaluator<A>,
        advertisement: Advertisement,
    ) {
        let frame = match AdvertisementFrame::parse(&advertisement.data) {
            Ok(frame) => frame,
            Err(e) => {
                // Unrelated BLE traffic is expected noise.
                trace!(error = %e, "dropping undecodable advertisement");
                self.stats.decode_failures.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };

        let uuid = frame.uuid_string();
        if uuid != *self.target.lock() {
            trace!(%uuid, "dropping advertisement for different beacon");
            self.stats.filtered_out.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let o3_value = i32::from(frame.major_value());
        let location = self.location.current_location().await.unwrap_or_default();
        let measurement = Measurement::new(o3_value, location);

        // Repeat broadcast of the same reading, not a new measurement.
        if self.latest.read().as_ref() == Some(&measurement) {
            trace!(o3_value, "dropping duplicate measurement");
            self.stats.duplicates.fetch_add(1, Ordering::SeqCst);
            return;
        }

        debug!(o3_value, "accepted measurement");
        *self.latest.write() = Some(measurement.clone());
        self.stats.accepted.fetch_add(1, Ordering::SeqCst);

        if let Some(tx) = self.subscriber.lock().as_ref() {
            // A gone subscriber is not an error.
            let _ = tx.send(measurement.clone());
        }

        self.tracker.update_connection_state(true);
        alerts.check_and_alert(o3_value).await;

        // Backend submission never blocks or fails the pipeline.
        let uplink = Arc::clone(&self.uplink);
        tokio::spawn(async move {
            if let Err(e) = uplink.submit(&measurement).await {
                warn!(error = %e, "measurement submission failed");
            }
        });
    }
}

pub struct BeaconListeningService<S, A>
where
    S: BeaconScanner + 'static,
    A: AlertSink + 'static,
{
    config: NodeConfig,
    state: Mutex<ServiceState>,
    scanner: Arc<AsyncMutex<S>>,
    scheduler: ScanScheduler<S>,
    tracker: Arc<ConnectionStateTracker>,
    alerts: Arc<AlertEvaluator<A>>,
    pipeline: Pipeline,
    consumer: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
}

impl<S, A> BeaconListeningService<S, A>
where
    S: BeaconScanner + 'static,
    A: AlertSink + 'static,
{
    pub fn new(
        scanner: S,
        alert_sink: A,
        location: Arc<dyn LocationProvider>,
        uplink: Arc<dyn MeasurementUplink>,
        config: NodeConfig,
    ) -> Self {
        let scanner = Arc::new(AsyncMutex::new(scanner));
        let scheduler = ScanScheduler::new(Arc::clone(&scanner), &config);
        let tracker = Arc::new(ConnectionStateTracker::new(&config));
        let alerts = Arc::new(AlertEvaluator::new(
            alert_sink,
            Arc::clone(&location),
            &config,
        ));

        let pipeline = Pipeline {
            target: Arc::new(Mutex::new(config.target_uuid.clone())),
            latest: Arc::new(RwLock::new(None)),
            subscriber: Arc::new(Mutex::new(None)),
            tracker: Arc::clone(&tracker),
            location,
            uplink,
            stats: Arc::new(PipelineStats::default()),
        };

        Self {
            config,
            state: Mutex::new(ServiceState::Created),
            scanner,
            scheduler,
            tracker,
            alerts,
            pipeline,
            consumer: Mutex::new(None),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Host `onCreate` equivalent: validates configuration and readies
    /// the trackers.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidConfig`] for an inconsistent
    /// duty cycle or thresholds.
    pub fn initialize(&self) -> Result<()> {
        self.config.validate()?;
        let mut state = self.state.lock();
        if *state == ServiceState::Created {
            *state = ServiceState::Initialized;
        }
        Ok(())
    }

    /// Host `onStartCommand` equivalent: begins scanning for the given
    /// target identifier. While running, a repeated start is a no-op
    /// for the scan state but refreshes the target.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ScannerUnavailable`] when the adapter is
    /// missing or disabled; the service stays idle and may be started
    /// again once the adapter is up. [`ServiceError::NotInitialized`]
    /// before [`initialize`](Self::initialize),
    /// [`ServiceError::NotRunning`] after [`stop`](Self::stop).
    pub async fn start(&self, target_uuid: impl Into<String>) -> Result<()> {
        let target_uuid = target_uuid.into();

        match *self.state.lock() {
            ServiceState::Running => {
                info!(target = %target_uuid, "already running, refreshing target");
                *self.pipeline.target.lock() = target_uuid;
                return Ok(());
            }
            ServiceState::Initialized => {}
            ServiceState::Created => return Err(ServiceError::NotInitialized),
            ServiceState::Stopped => return Err(ServiceError::NotRunning),
        }

        match self.scanner.lock().await.ensure_ready().await {
            Ok(()) => {}
            Err(ScanError::AdapterNotAvailable) => {
                warn!("bluetooth adapter unavailable, staying idle");
                return Err(ServiceError::ScannerUnavailable);
            }
            Err(e) => return Err(e.into()),
        }

        *self.pipeline.target.lock() = target_uuid.clone();
        self.spawn_consumer().await;
        self.tracker.spawn_timeout_checker();
        self.scheduler.start();
        *self.state.lock() = ServiceState::Running;
        info!(target = %target_uuid, "beacon listening service running");
        Ok(())
    }

    async fn spawn_consumer(&self) {
        let mut stream = self.scanner.lock().await.advertisement_stream();
        let pipeline = self.pipeline.clone();
        let alerts = Arc::clone(&self.alerts);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    maybe = stream.next() => match maybe {
                        Some(advertisement) => {
                            pipeline.process(alerts.as_ref(), advertisement).await;
                        }
                        None => break,
                    },
                }
            }
            debug!("scan-result consumer ended");
        });

        *self.consumer.lock() = Some(handle);
    }

    /// Full teardown: stops the duty cycle, the consumer and the
    /// timeout checker, and releases alert resources. After this
    /// returns, no scan window opens and no measurement notification
    /// fires. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state != ServiceState::Running {
                return;
            }
            *state = ServiceState::Stopped;
        }

        self.scheduler.stop().await;

        self.shutdown.notify_waiters();
        let handle = self.consumer.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
                warn!("consumer did not stop within grace period, aborting");
                abort.abort();
            }
        }

        self.tracker.cleanup().await;
        self.alerts.cleanup().await;
        info!("beacon listening service stopped");
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Latest accepted measurement; `None` before the first valid
    /// reading. Snapshot read, safe from any task.
    pub fn last_measurement(&self) -> Option<Measurement> {
        self.pipeline.latest.read().clone()
    }

    /// Registers the measurement listener. At most one is live; a new
    /// registration replaces the previous one (its receiver closes).
    pub fn subscribe_measurements(&self) -> mpsc::UnboundedReceiver<Measurement> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.pipeline.subscriber.lock() = Some(tx);
        rx
    }

    pub fn subscribe_connection_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.tracker.subscribe()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.tracker.status()
    }

    /// Escape hatch after a manual reconnection action.
    pub fn force_reset_connection(&self) {
        self.tracker.force_reset();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats.snapshot()
    }

    /// The injected alert sink, mostly useful for inspection in tests
    /// and demos.
    pub fn alert_sink(&self) -> &A {
        self.alerts.sink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MockAlertSink;
    use crate::location::NoLocation;
    use crate::scanner::{MockScanner, MockScannerProbe};
    use crate::uplink::NullUplink;

    fn service(
        scanner: MockScanner,
    ) -> (
        BeaconListeningService<MockScanner, MockAlertSink>,
        MockScannerProbe,
    ) {
        let probe = scanner.probe();
        let service = BeaconListeningService::new(
            scanner,
            MockAlertSink::new(),
            Arc::new(NoLocation),
            Arc::new(NullUplink),
            NodeConfig::new("AERO-TEST-NODE-1"),
        );
        (service, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_states() {
        let (svc, _probe) = service(MockScanner::new());
        assert_eq!(svc.state(), ServiceState::Created);

        svc.initialize().unwrap();
        assert_eq!(svc.state(), ServiceState::Initialized);

        svc.start("AERO-TEST-NODE-1").await.unwrap();
        assert_eq!(svc.state(), ServiceState::Running);

        svc.stop().await;
        assert_eq!(svc.state(), ServiceState::Stopped);

        // Stopped is terminal.
        assert!(matches!(
            svc.start("AERO-TEST-NODE-1").await,
            Err(ServiceError::NotRunning)
        ));
        svc.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_initialize() {
        let (svc, _probe) = service(MockScanner::new());
        assert!(matches!(
            svc.start("AERO-TEST-NODE-1").await,
            Err(ServiceError::NotInitialized)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_without_adapter() {
        let (svc, _probe) = service(MockScanner::unavailable());
        svc.initialize().unwrap();
        assert!(matches!(
            svc.start("AERO-TEST-NODE-1").await,
            Err(ServiceError::ScannerUnavailable)
        ));
        // Still idle, not running.
        assert_eq!(svc.state(), ServiceState::Initialized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_start_refreshes_target() {
        let (svc, _probe) = service(MockScanner::new());
        svc.initialize().unwrap();
        svc.start("AERO-TEST-NODE-1").await.unwrap();
        svc.start("AERO-TEST-NODE-2").await.unwrap();
        assert_eq!(*svc.pipeline.target.lock(), "AERO-TEST-NODE-2");
        svc.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_rejected_at_initialize() {
        let scanner = MockScanner::new();
        let svc = BeaconListeningService::new(
            scanner,
            MockAlertSink::new(),
            Arc::new(NoLocation),
            Arc::new(NullUplink),
            NodeConfig {
                scan_period: Duration::from_secs(20),
                ..NodeConfig::new("AERO-TEST-NODE-1")
            },
        );
        assert!(matches!(
            svc.initialize(),
            Err(ServiceError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_measurement_empty_before_first_reading() {
        let (svc, _probe) = service(MockScanner::new());
        assert!(svc.last_measurement().is_none());
    }
}
