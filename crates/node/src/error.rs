use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("adapter not available")]
    AdapterNotAvailable,

    #[error("scan already in progress")]
    ScanInProgress,

    #[error("not scanning")]
    NotScanning,

    #[error("hardware error: {0}")]
    Hardware(String),
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert sound unavailable: {0}")]
    SoundUnavailable(String),

    #[error("notification failed: {0}")]
    NotificationFailed(String),
}

#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend rejected measurement: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("scanner unavailable")]
    ScannerUnavailable,

    #[error("service not initialized")]
    NotInitialized,

    #[error("service not running")]
    NotRunning,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
