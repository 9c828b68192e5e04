//! Scan duty cycle: a window of `scan_period` with the radio
//! listening, then idle for the remainder of `scan_interval`,
//! repeated until stopped.
//!
//! The scanner sits behind one async mutex shared with the stop path,
//! so window open/close calls are serialized and never race. Waits
//! are scheduled sleeps raced against a shutdown [`Notify`]; nothing
//! busy-waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::NodeConfig;
use crate::scanner::BeaconScanner;

/// Grace period for the duty-cycle task to wind down on stop.
const STOP_GRACE: Duration = Duration::from_secs(1);

pub struct ScanScheduler<S: BeaconScanner + 'static> {
    scanner: Arc<AsyncMutex<S>>,
    scan_period: Duration,
    idle_period: Duration,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    cycle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: BeaconScanner + 'static> ScanScheduler<S> {
    pub fn new(scanner: Arc<AsyncMutex<S>>, config: &NodeConfig) -> Self {
        Self {
            scanner,
            scan_period: config.scan_period,
            idle_period: config.idle_period(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            cycle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the duty cycle. A no-op while already running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let scanner = Arc::clone(&self.scanner);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let scan_period = self.scan_period;
        let idle_period = self.idle_period;

        let handle = tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                if let Err(e) = scanner.lock().await.start_scan().await {
                    warn!(error = %e, "failed to open scan window");
                    // The adapter may recover; wait out the cycle
                    // instead of spinning.
                }

                tokio::select! {
                    _ = shutdown.notified() => {}
                    _ = tokio::time::sleep(scan_period) => {}
                }

                if let Err(e) = scanner.lock().await.stop_scan().await {
                    debug!(error = %e, "scan window already closed");
                }

                if !running.load(Ordering::SeqCst) {
                    break;
                }

                tokio::select! {
                    _ = shutdown.notified() => {}
                    _ = tokio::time::sleep(idle_period) => {}
                }
            }
            debug!("scan duty cycle ended");
        });

        *self.cycle.lock() = Some(handle);
    }

    /// Stops the duty cycle. After this returns no further scan
    /// window opens; an in-flight window is closed. Waits a bounded
    /// grace period for the cycle task, then aborts it.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_waiters();

        let handle = self.cycle.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
                warn!("duty cycle did not stop within grace period, aborting");
                abort.abort();
            }
        }

        // The task closes its window on the way out; this covers the
        // abort path.
        if let Err(e) = self.scanner.lock().await.stop_scan().await {
            debug!(error = %e, "no scan window open at stop");
        }
    }
}
