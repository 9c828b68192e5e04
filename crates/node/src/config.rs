//! Tunable constants for the scan duty cycle, connection tracking and
//! gas alerting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// How long each scan window stays open.
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_millis(1000);

/// Full duty-cycle length: one scan window plus the idle remainder.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(10_000);

/// Silence longer than this marks the beacon as disconnected.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(40_000);

/// Reconnection attempts tolerated before falling back to disconnected.
pub const DEFAULT_MAX_RECONNECTION_ATTEMPTS: u32 = 3;

/// O3 concentration (PPM) above which an alert is raised.
pub const DEFAULT_PPM_DANGER_THRESHOLD: i32 = 100;

/// O3 readings above this are sensor faults, not valid measurements.
pub const DEFAULT_PPM_MAX_VALID: i32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identifier string the decoded UUID region must match.
    pub target_uuid: String,

    pub scan_period: Duration,
    pub scan_interval: Duration,
    pub connection_timeout: Duration,
    pub max_reconnection_attempts: u32,
    pub ppm_danger_threshold: i32,
    pub ppm_max_valid: i32,
}

impl NodeConfig {
    pub fn new(target_uuid: impl Into<String>) -> Self {
        Self {
            target_uuid: target_uuid.into(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidConfig`] when the duty cycle or
    /// thresholds are inconsistent.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.scan_period.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "scan_period must be non-zero".into(),
            ));
        }
        if self.scan_period > self.scan_interval {
            return Err(ServiceError::InvalidConfig(format!(
                "scan_period {:?} exceeds scan_interval {:?}",
                self.scan_period, self.scan_interval
            )));
        }
        if self.ppm_danger_threshold > self.ppm_max_valid {
            return Err(ServiceError::InvalidConfig(format!(
                "danger threshold {} above max valid reading {}",
                self.ppm_danger_threshold, self.ppm_max_valid
            )));
        }
        Ok(())
    }

    /// Idle remainder of one duty cycle.
    pub fn idle_period(&self) -> Duration {
        self.scan_interval.saturating_sub(self.scan_period)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            target_uuid: String::new(),
            scan_period: DEFAULT_SCAN_PERIOD,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            max_reconnection_attempts: DEFAULT_MAX_RECONNECTION_ATTEMPTS,
            ppm_danger_threshold: DEFAULT_PPM_DANGER_THRESHOLD,
            ppm_max_valid: DEFAULT_PPM_MAX_VALID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::new("AERO-TEST-NODE-1");
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_period(), Duration::from_millis(9000));
    }

    #[test]
    fn test_rejects_zero_scan_period() {
        let config = NodeConfig {
            scan_period: Duration::ZERO,
            ..NodeConfig::new("x")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_period_longer_than_interval() {
        let config = NodeConfig {
            scan_period: Duration::from_secs(20),
            ..NodeConfig::new("x")
        };
        assert!(config.validate().is_err());
    }
}
