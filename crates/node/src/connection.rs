//! Timeout-driven beacon reachability tracking.
//!
//! Two paths mutate the state concurrently: the measurement-arrival
//! path (one call per accepted reading) and a periodic timeout
//! checker running on its own task. Both funnel through one mutex;
//! listener events are sent on a broadcast channel only after the
//! lock is released, so a slow listener can never block an update.
//! Delivery is fire-and-forget, no history is kept.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::NodeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Lost,
    Restored,
}

struct Inner {
    status: ConnectionStatus,
    last_valid: Option<Instant>,
    attempts: u32,
}

pub struct ConnectionStateTracker {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<ConnectionEvent>,
    timeout: Duration,
    max_attempts: u32,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    checker: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionStateTracker {
    /// Starts out connected, as if a valid measurement had just
    /// arrived. The periodic timeout check is started separately with
    /// [`spawn_timeout_checker`](Self::spawn_timeout_checker).
    pub fn new(config: &NodeConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                status: ConnectionStatus::Connected,
                last_valid: Some(Instant::now()),
                attempts: 0,
            })),
            events,
            timeout: config.connection_timeout,
            max_attempts: config.max_reconnection_attempts,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            checker: Mutex::new(None),
        }
    }

    /// Spawns the periodic timeout check, one tick per
    /// `connection_timeout`. Idempotent while running.
    pub fn spawn_timeout_checker(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let tracker = Arc::clone(self);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = tokio::time::sleep(timeout) => {}
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                tracker.check_connection_timeout();
            }
        });

        *self.checker.lock() = Some(handle);
    }

    /// Measurement-arrival path. Invalid measurements leave the state
    /// untouched; valid ones refresh the liveness instant and drive
    /// the reconnection counter.
    pub fn update_connection_state(&self, is_valid_measurement: bool) {
        if !is_valid_measurement {
            return;
        }

        let event = {
            let mut inner = self.inner.lock();
            inner.last_valid = Some(Instant::now());

            match inner.status {
                ConnectionStatus::Connected => {
                    inner.attempts = 0;
                    None
                }
                ConnectionStatus::Disconnected | ConnectionStatus::Reconnecting => {
                    inner.attempts += 1;
                    if inner.attempts <= self.max_attempts {
                        info!(attempt = inner.attempts, "beacon reachable again, reconnecting");
                        inner.status = ConnectionStatus::Reconnecting;
                        Some(ConnectionEvent::Restored)
                    } else {
                        inner.status = ConnectionStatus::Disconnected;
                        inner.attempts = 0;
                        Some(ConnectionEvent::Lost)
                    }
                }
            }
        };

        self.emit(event);
    }

    /// Timeout path: silence longer than `connection_timeout` (or no
    /// measurement ever) drops the state to disconnected, once per
    /// loss.
    pub fn check_connection_timeout(&self) {
        let event = {
            let mut inner = self.inner.lock();
            let timed_out = match inner.last_valid {
                None => true,
                Some(at) => at.elapsed() > self.timeout,
            };

            if timed_out && inner.status != ConnectionStatus::Disconnected {
                info!("no valid measurement within timeout, beacon disconnected");
                inner.status = ConnectionStatus::Disconnected;
                inner.attempts = 0;
                Some(ConnectionEvent::Lost)
            } else {
                None
            }
        };

        self.emit(event);
    }

    /// Escape hatch for external callers, e.g. after a manual
    /// reconnection action: unconditionally connected.
    pub fn force_reset(&self) {
        let mut inner = self.inner.lock();
        inner.status = ConnectionStatus::Connected;
        inner.last_valid = Some(Instant::now());
        inner.attempts = 0;
        debug!("connection state forcefully reset");
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Fire-and-forget event feed; at-least-once while subscribed, no
    /// replay of past transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Permanently stops the periodic check. No timeout fires after
    /// this returns.
    pub async fn cleanup(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        let handle = self.checker.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .is_err()
            {
                debug!("timeout checker did not exit in time, aborting");
                abort.abort();
            }
        }
    }

    fn emit(&self, event: Option<ConnectionEvent>) {
        if let Some(event) = event {
            // No subscriber is fine; events are best-effort.
            let _ = self.events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn tracker() -> Arc<ConnectionStateTracker> {
        Arc::new(ConnectionStateTracker::new(&NodeConfig::new(
            "AERO-TEST-NODE-1",
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_connected() {
        let t = tracker();
        assert_eq!(t.status(), ConnectionStatus::Connected);
        assert!(t.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_disconnects_exactly_once() {
        let t = tracker();
        let mut events = t.subscribe();
        t.spawn_timeout_checker();

        // Two checker ticks: at the first the silence equals the
        // timeout, at the second it exceeds it.
        advance(Duration::from_millis(80_001)).await;
        tokio::task::yield_now().await;

        assert_eq!(t.status(), ConnectionStatus::Disconnected);
        assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Lost);
        assert!(events.try_recv().is_err());

        // Further silence must not re-fire the loss.
        advance(Duration::from_millis(120_000)).await;
        tokio::task::yield_now().await;
        assert!(events.try_recv().is_err());

        t.cleanup().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_measurement_keeps_connected() {
        let t = tracker();
        let mut events = t.subscribe();

        advance(Duration::from_millis(30_000)).await;
        t.update_connection_state(true);
        t.check_connection_timeout();

        assert_eq!(t.status(), ConnectionStatus::Connected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_measurement_is_ignored() {
        let t = tracker();
        advance(Duration::from_millis(50_000)).await;
        t.update_connection_state(false);
        t.check_connection_timeout();
        assert_eq!(t.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnection_after_loss() {
        let t = tracker();
        let mut events = t.subscribe();

        advance(Duration::from_millis(50_000)).await;
        t.check_connection_timeout();
        assert_eq!(t.status(), ConnectionStatus::Disconnected);
        assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Lost);

        t.update_connection_state(true);
        assert_eq!(t.status(), ConnectionStatus::Reconnecting);
        assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Restored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_exhausted_rolls_back_to_disconnected() {
        let t = tracker();
        let mut events = t.subscribe();

        advance(Duration::from_millis(50_000)).await;
        t.check_connection_timeout();
        assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Lost);

        // MAX_RECONNECTION_ATTEMPTS valid measurements while never
        // explicitly reaching Connected.
        for _ in 0..3 {
            t.update_connection_state(true);
            assert_eq!(t.status(), ConnectionStatus::Reconnecting);
            assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Restored);
        }

        // One more attempt exceeds the budget.
        t.update_connection_state(true);
        assert_eq!(t.status(), ConnectionStatus::Disconnected);
        assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Lost);

        // And a later timeout still finds its way back to
        // disconnected after an intermediate reconnection.
        t.update_connection_state(true);
        assert_eq!(t.status(), ConnectionStatus::Reconnecting);
        advance(Duration::from_millis(50_000)).await;
        t.check_connection_timeout();
        assert_eq!(t.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_reset() {
        let t = tracker();
        advance(Duration::from_millis(50_000)).await;
        t.check_connection_timeout();
        assert_eq!(t.status(), ConnectionStatus::Disconnected);

        t.force_reset();
        assert!(t.is_connected());

        // The reset also refreshed the liveness instant.
        t.check_connection_timeout();
        assert!(t.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_stops_checker() {
        let t = tracker();
        let mut events = t.subscribe();
        t.spawn_timeout_checker();
        t.cleanup().await;

        advance(Duration::from_millis(200_000)).await;
        tokio::task::yield_now().await;
        assert!(events.try_recv().is_err());
    }
}
