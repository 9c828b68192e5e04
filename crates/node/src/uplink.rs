//! Opaque backend boundary for measurement submission.
//!
//! The pipeline's responsibility ends at producing a measurement; a
//! failed submission is logged and never feeds back into scan or
//! connection state.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use aero_beacon::Measurement;

use crate::error::UplinkError;

#[async_trait]
pub trait MeasurementUplink: Send + Sync {
    async fn submit(&self, measurement: &Measurement) -> Result<(), UplinkError>;
}

/// Discards every measurement. Default when no backend is wired up.
pub struct NullUplink;

#[async_trait]
impl MeasurementUplink for NullUplink {
    async fn submit(&self, _measurement: &Measurement) -> Result<(), UplinkError> {
        Ok(())
    }
}

/// Recording uplink for tests.
pub struct MockUplink {
    submissions: Mutex<Vec<Measurement>>,
    fail_count: AtomicUsize,
    should_fail: bool,
}

impl MockUplink {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            fail_count: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn submissions(&self) -> Vec<Measurement> {
        self.submissions.lock().clone()
    }

    pub fn failures(&self) -> usize {
        self.fail_count.load(Ordering::SeqCst)
    }
}

impl Default for MockUplink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeasurementUplink for MockUplink {
    async fn submit(&self, measurement: &Measurement) -> Result<(), UplinkError> {
        if self.should_fail {
            self.fail_count.fetch_add(1, Ordering::SeqCst);
            return Err(UplinkError::Unreachable("mock backend down".into()));
        }
        self.submissions.lock().push(measurement.clone());
        Ok(())
    }
}
