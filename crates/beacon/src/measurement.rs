use serde::{Deserialize, Serialize};

/// Best-effort device coordinates. Defaults to (0.0, 0.0) when no
/// location source is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One ozone reading produced per accepted scan result. Immutable:
/// a new reading supersedes the previous one, nothing is edited in
/// place. The timestamp is assigned by the backend on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub o3_value: i32,
    pub latitude: f64,
    pub longitude: f64,
}

impl Measurement {
    pub fn new(o3_value: i32, location: GeoPoint) -> Self {
        Self {
            o3_value,
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}
