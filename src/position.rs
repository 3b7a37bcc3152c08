use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// A geographic point in decimal degrees
pub struct GeoPoint {
    /// Latitude, positive north
    pub latitude: f64,
    /// Longitude, positive east
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True for exactly (0°, 0°)
    pub fn is_zero(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// True if either coordinate is NaN
    pub fn is_nan(&self) -> bool {
        self.latitude.is_nan() || self.longitude.is_nan()
    }
}

#[derive(Debug, Default)]
/// The most recent valid fix, kept until overwritten
pub struct LastPosition {
    point: Mutex<Option<GeoPoint>>,
}

impl LastPosition {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached point
    pub fn set(&self, point: GeoPoint) {
        *self.point.lock().unwrap_or_else(PoisonError::into_inner) = Some(point);
    }

    /// The cached point, if one was ever set
    pub fn get(&self) -> Option<GeoPoint> {
        *self.point.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if the point is (0°, 0°)
    pub fn is_zero_position(point: &GeoPoint) -> bool {
        point.is_zero()
    }

    /// True if the point has a NaN coordinate
    pub fn is_position_nan(point: &GeoPoint) -> bool {
        point.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(LastPosition::is_zero_position(&GeoPoint::new(0.0, 0.0)));
        assert!(!LastPosition::is_zero_position(&GeoPoint::new(0.0, 1e-9)));
        assert!(LastPosition::is_position_nan(&GeoPoint::new(f64::NAN, 3.0)));
        assert!(LastPosition::is_position_nan(&GeoPoint::new(f64::NAN, f64::NAN)));
        assert!(!LastPosition::is_position_nan(&GeoPoint::new(40.7, -73.98)));
    }

    #[test]
    fn keeps_latest() {
        let cache = LastPosition::new();
        assert_eq!(cache.get(), None);
        cache.set(GeoPoint::new(1.0, 2.0));
        cache.set(GeoPoint::new(40.7, -73.98));
        assert_eq!(cache.get(), Some(GeoPoint::new(40.7, -73.98)));
    }
}
