use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;
use crate::ntrip::{GgaError, NtripError};
use crate::sensor::SensorError;
use crate::transport::TransportError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
/// Errors surfaced by the RTK pipeline
pub enum Error {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Caster connection or stream failure
    #[error(transparent)]
    Ntrip(#[from] NtripError),
    /// GGA sentence could not be obtained from the receiver
    #[error(transparent)]
    Gga(#[from] GgaError),
    /// Receiver transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Underlying movement sensor failure
    #[error(transparent)]
    Sensor(#[from] SensorError),
    /// The correction relay was cancelled
    #[error("correction relay cancelled")]
    Cancelled,
    /// The correction relay was already started
    #[error("correction relay already started")]
    AlreadyStarted,
    /// The relay thread could not be spawned
    #[error("failed to spawn correction relay thread: {0}")]
    Thread(std::io::Error),
    /// A fault latched by the correction relay
    #[error(transparent)]
    Latched(Arc<Error>),
}

impl Error {
    /// True if this error, or the fault it wraps, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled | Error::Ntrip(NtripError::Cancelled) => true,
            Error::Latched(inner) => inner.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_seen_through_latch() {
        let err = Error::Latched(Arc::new(Error::Ntrip(NtripError::Cancelled)));
        assert!(err.is_cancelled());
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Ntrip(NtripError::NotConnected).is_cancelled());
    }

    #[test]
    fn latched_error_displays_cause() {
        let err = Error::Latched(Arc::new(Error::Ntrip(NtripError::ConnectAttempts {
            attempts: 3,
            source: Box::new(NtripError::InvalidAddress("invalidurl".into())),
        })));
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"), "{msg}");
    }
}
