//! Best-effort location lookup.
//!
//! A missing location never blocks or fails measurement construction;
//! callers fall back to zero coordinates.

use async_trait::async_trait;

use aero_beacon::GeoPoint;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Current coordinates, or `None` when no source is available.
    async fn current_location(&self) -> Option<GeoPoint>;
}

/// Provider with no location source. Readings get zero coordinates.
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_location(&self) -> Option<GeoPoint> {
        None
    }
}

/// Fixed coordinates, for stationary deployments and tests.
pub struct FixedLocation(pub GeoPoint);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Option<GeoPoint> {
        Some(self.0)
    }
}

/// Human-readable coordinates for notifications.
pub fn location_string(location: Option<GeoPoint>) -> String {
    match location {
        Some(p) => format!("Lat: {:.6}, Long: {:.6}", p.latitude, p.longitude),
        None => "Location not available".to_string(),
    }
}
