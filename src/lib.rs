#![deny(missing_docs)]
//! # RTK GPS
//! NTRIP correction relay for RTK capable GNSS receivers.
//!
//! Connects to an NTRIP caster, delimits the RTCM3 correction stream into
//! frames and writes them into a receiver attached over serial or I2C.
//! Virtual reference station mountpoints are fed the receiver's GGA
//! sentences. [`RtkMovementSensor`] wraps a positioning sensor, runs the
//! relay in the background and falls back to the last good fix when the
//! sensor reports a zero or NaN position.
mod cancel;
mod config;
mod error;
mod fault;
mod ntrip;
pub mod pmtk;
mod position;
mod relay;
mod rtcm;
mod rtk;
mod sensor;
mod transport;

pub use cancel::CancelToken;
pub use config::{
    ConfigError, I2cConfig, NtripConfig, RtkI2cConfig, RtkSerialConfig, SerialConfig,
    DEFAULT_BAUD_RATE, DEFAULT_CONNECT_ATTEMPTS,
};
pub use error::{Error, Result};
pub use fault::LastError;
pub use ntrip::{
    find_gga, CorrectionStream, GgaError, NtripClient, NtripConnection, NtripError, Sourcetable,
    StreamCloser, StreamEntry, StreamStatus, VirtualBaseSession, VrsState, GGA_BUFFER_LEN,
};
pub use position::{GeoPoint, LastPosition};
pub use relay::CorrectionRelay;
pub use rtcm::{crc24q, RtcmScanner, MAX_PAYLOAD_LEN, PREAMBLE};
pub use rtk::RtkMovementSensor;
pub use sensor::{
    AngularVelocity, MovementSensor, Orientation, Properties, SensorError, Vector3,
};
pub use transport::{
    I2cBus, I2cTransport, ReceiverHandle, ReceiverTransport, SerialTransport, TransportError,
};
