pub mod alert;
pub mod config;
pub mod connection;
pub mod error;
pub mod location;
pub mod scanner;
pub mod scheduler;
pub mod service;
pub mod uplink;

#[cfg(feature = "ble")]
pub mod ble_scanner;

pub use alert::{AlertEvaluator, AlertNotification, AlertSink, MockAlertSink};
pub use config::NodeConfig;
pub use connection::{ConnectionEvent, ConnectionStateTracker, ConnectionStatus};
pub use error::{AlertError, Result, ScanError, ServiceError, UplinkError};
pub use location::{location_string, FixedLocation, LocationProvider, NoLocation};
pub use scanner::{
    Advertisement, AdvertisementStream, BeaconScanner, MockScanner, MockScannerProbe, WindowEvent,
};
pub use scheduler::ScanScheduler;
pub use service::{BeaconListeningService, PipelineStats, ServiceState, StatsSnapshot};
pub use uplink::{MeasurementUplink, MockUplink, NullUplink};

#[cfg(feature = "ble")]
pub use ble_scanner::BtleScanner;
