use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CancelToken, GeoPoint};

#[derive(Error, Clone, Debug, PartialEq, Eq)]
/// Errors reported by the underlying positioning sensor
pub enum SensorError {
    /// No fix has been acquired yet
    #[error("no fix acquired")]
    NoFix,
    /// The sensor does not provide this quantity
    #[error("{0} not supported")]
    NotSupported(&'static str),
    /// The sensor failed to read or parse its input
    #[error("sensor error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// A three dimensional vector
pub struct Vector3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// Angular velocity in degrees per second
pub struct AngularVelocity {
    /// Rotation about X
    pub x: f64,
    /// Rotation about Y
    pub y: f64,
    /// Rotation about Z
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// Orientation as Euler angles in degrees, zero is the identity
pub struct Orientation {
    /// Roll
    pub roll: f64,
    /// Pitch
    pub pitch: f64,
    /// Yaw
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Quantities a movement sensor supports
pub struct Properties {
    /// Reports linear velocity
    pub linear_velocity_supported: bool,
    /// Reports angular velocity
    pub angular_velocity_supported: bool,
    /// Reports orientation
    pub orientation_supported: bool,
    /// Reports position
    pub position_supported: bool,
    /// Reports compass heading
    pub compass_heading_supported: bool,
    /// Reports linear acceleration
    pub linear_acceleration_supported: bool,
}

/// The positioning sensor that parses the receiver's NMEA output.
///
/// Implementations are expected to be internally synchronized and may
/// transiently report a zero or NaN position.
pub trait MovementSensor: Send + Sync {
    /// Begin reading the receiver until `cancel` fires
    fn start(&self, cancel: CancelToken) -> Result<(), SensorError>;
    /// Current position and altitude in meters
    fn position(&self) -> Result<(GeoPoint, f64), SensorError>;
    /// Current linear velocity in meters per second
    fn linear_velocity(&self) -> Result<Vector3, SensorError>;
    /// Current linear acceleration in meters per second squared
    fn linear_acceleration(&self) -> Result<Vector3, SensorError>;
    /// Current angular velocity
    fn angular_velocity(&self) -> Result<AngularVelocity, SensorError>;
    /// Current orientation
    fn orientation(&self) -> Result<Orientation, SensorError>;
    /// Current compass heading in degrees
    fn compass_heading(&self) -> Result<f64, SensorError>;
    /// Supported quantities
    fn properties(&self) -> Result<Properties, SensorError>;
    /// Named accuracy estimates, e.g. `hDOP`
    fn accuracy(&self) -> Result<HashMap<String, f32>, SensorError>;
    /// Fix quality as reported by GGA
    fn read_fix(&self) -> Result<i32, SensorError>;
    /// Number of satellites in view
    fn read_satellites_in_view(&self) -> Result<i32, SensorError>;
    /// Stop reading and release the receiver
    fn close(&self) -> Result<(), SensorError>;
}
