//! Threshold evaluation and alert dispatch.
//!
//! The evaluator owns the policy (danger threshold, valid range, no
//! overlapping sounds); platform side effects live behind
//! [`AlertSink`] so the logic runs without an audio or notification
//! stack.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NodeConfig;
use crate::error::AlertError;
use crate::location::{location_string, LocationProvider};

fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Payload of a danger notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub o3_value: i32,
    pub timestamp_ms: u64,
    pub location: String,
}

/// Platform capability for audible and visual alerts. Notifications
/// are expected to use a stable identity so a repeated alert replaces
/// the previous one instead of stacking.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn sound_is_playing(&self) -> bool;

    async fn play_sound(&self) -> Result<(), AlertError>;

    async fn post_alert(&self, notification: AlertNotification);

    async fn post_sensor_error(&self, kind: &str, details: &str);

    /// Releases audio resources and clears outstanding notifications.
    async fn clear(&self);
}

pub struct AlertEvaluator<S: AlertSink> {
    sink: S,
    location: Arc<dyn LocationProvider>,
    danger_threshold: i32,
    max_valid: i32,
    cleaned_up: AtomicBool,
}

impl<S: AlertSink> AlertEvaluator<S> {
    pub fn new(sink: S, location: Arc<dyn LocationProvider>, config: &NodeConfig) -> Self {
        Self {
            sink,
            location,
            danger_threshold: config.ppm_danger_threshold,
            max_valid: config.ppm_max_valid,
            cleaned_up: AtomicBool::new(false),
        }
    }

    /// Raises an alert when `o3_value` exceeds the danger threshold.
    ///
    /// Out-of-range readings produce a sensor-error notification
    /// instead. A sound already in progress suppresses the audio cue
    /// but never the notification; a failing audio device degrades to
    /// notification-only. After [`cleanup`](Self::cleanup) this is a
    /// no-op.
    pub async fn check_and_alert(&self, o3_value: i32) {
        if self.cleaned_up.load(Ordering::SeqCst) {
            return;
        }

        if o3_value < 0 || o3_value > self.max_valid {
            warn!(o3_value, "sensor reading out of range");
            self.sink
                .post_sensor_error("INVALID_READING", "sensor is reporting out-of-range values")
                .await;
            return;
        }

        if o3_value <= self.danger_threshold {
            return;
        }

        if self.sink.sound_is_playing() {
            debug!(o3_value, "alert sound already in progress");
        } else if let Err(e) = self.sink.play_sound().await {
            // Sound failure is degraded operation, not fatal.
            warn!(error = %e, "failed to play alert sound");
        }

        let location = location_string(self.location.current_location().await);
        self.sink
            .post_alert(AlertNotification {
                o3_value,
                timestamp_ms: now_timestamp(),
                location,
            })
            .await;
    }

    /// Releases the sink. Later `check_and_alert` calls are no-ops.
    pub async fn cleanup(&self) {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.clear().await;
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Recording sink for tests and demos.
pub struct MockAlertSink {
    playing: AtomicBool,
    fail_sound: bool,
    sounds_played: AtomicUsize,
    clear_count: AtomicUsize,
    alerts: Mutex<Vec<AlertNotification>>,
    sensor_errors: Mutex<Vec<(String, String)>>,
}

impl MockAlertSink {
    pub fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            fail_sound: false,
            sounds_played: AtomicUsize::new(0),
            clear_count: AtomicUsize::new(0),
            alerts: Mutex::new(Vec::new()),
            sensor_errors: Mutex::new(Vec::new()),
        }
    }

    /// Sink whose audio device always fails.
    pub fn failing_sound() -> Self {
        Self {
            fail_sound: true,
            ..Self::new()
        }
    }

    /// Simulates a sound still in progress.
    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn sounds_played(&self) -> usize {
        self.sounds_played.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count.load(Ordering::SeqCst)
    }

    pub fn alerts(&self) -> Vec<AlertNotification> {
        self.alerts.lock().clone()
    }

    pub fn sensor_errors(&self) -> Vec<(String, String)> {
        self.sensor_errors.lock().clone()
    }
}

impl Default for MockAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSink for MockAlertSink {
    fn sound_is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    async fn play_sound(&self) -> Result<(), AlertError> {
        if self.fail_sound {
            return Err(AlertError::SoundUnavailable("mock audio failure".into()));
        }
        self.sounds_played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn post_alert(&self, notification: AlertNotification) {
        // Stable notification identity: the latest alert replaces the
        // previous one.
        self.alerts.lock().push(notification);
    }

    async fn post_sensor_error(&self, kind: &str, details: &str) {
        self.sensor_errors
            .lock()
            .push((kind.to_string(), details.to_string()));
    }

    async fn clear(&self) {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        self.alerts.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FixedLocation, NoLocation};
    use aero_beacon::GeoPoint;

    fn evaluator(sink: MockAlertSink) -> AlertEvaluator<MockAlertSink> {
        AlertEvaluator::new(
            sink,
            Arc::new(NoLocation),
            &NodeConfig::new("AERO-TEST-NODE-1"),
        )
    }

    #[tokio::test]
    async fn test_alert_above_threshold_only() {
        let eval = evaluator(MockAlertSink::new());

        eval.check_and_alert(99).await;
        eval.check_and_alert(100).await;
        assert!(eval.sink().alerts().is_empty());
        assert_eq!(eval.sink().sounds_played(), 0);

        eval.check_and_alert(101).await;
        let alerts = eval.sink().alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].o3_value, 101);
        assert_eq!(eval.sink().sounds_played(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_is_sensor_error() {
        let eval = evaluator(MockAlertSink::new());

        eval.check_and_alert(-1).await;
        eval.check_and_alert(1001).await;

        assert!(eval.sink().alerts().is_empty());
        assert_eq!(eval.sink().sensor_errors().len(), 2);
    }

    #[tokio::test]
    async fn test_no_overlapping_sounds() {
        let eval = evaluator(MockAlertSink::new());
        eval.sink().set_playing(true);

        eval.check_and_alert(150).await;

        // Audio suppressed, notification still delivered.
        assert_eq!(eval.sink().sounds_played(), 0);
        assert_eq!(eval.sink().alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_sound_failure_degrades_to_notification() {
        let eval = evaluator(MockAlertSink::failing_sound());

        eval.check_and_alert(150).await;

        assert_eq!(eval.sink().alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_disables_evaluator() {
        let eval = evaluator(MockAlertSink::new());

        eval.cleanup().await;
        eval.cleanup().await;
        assert_eq!(eval.sink().clear_count(), 1);

        eval.check_and_alert(500).await;
        assert!(eval.sink().alerts().is_empty());
    }

    #[tokio::test]
    async fn test_alert_carries_location() {
        let sink = MockAlertSink::new();
        let eval = AlertEvaluator::new(
            sink,
            Arc::new(FixedLocation(GeoPoint::new(39.47, -0.37))),
            &NodeConfig::new("AERO-TEST-NODE-1"),
        );

        eval.check_and_alert(150).await;
        assert_eq!(eval.sink().alerts()[0].location, "Lat: 39.470000, Long: -0.370000");
    }
}
