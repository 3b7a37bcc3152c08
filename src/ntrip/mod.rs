//! NTRIP caster client, session and virtual reference station handshake.

use thiserror::Error;

mod client;
mod connection;
mod http;
mod sourcetable;
mod vrs;

pub use client::{CorrectionStream, NtripClient, StreamCloser};
pub use connection::{NtripConnection, StreamStatus};
pub use sourcetable::{Sourcetable, StreamEntry};
pub use vrs::{find_gga, VirtualBaseSession, VrsState, GGA_BUFFER_LEN};

#[derive(Error, Debug)]
/// Caster side errors
pub enum NtripError {
    /// The caster address could not be parsed
    #[error("invalid caster address {0:?}: address must start with http://")]
    InvalidAddress(String),
    /// The caster host name did not resolve
    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        /// Host name
        host: String,
        /// Resolver error
        source: std::io::Error,
    },
    /// The TCP connection could not be established
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address dialed
        addr: String,
        /// Socket error
        source: std::io::Error,
    },
    /// Every connect attempt failed
    #[error("can't connect to NTRIP caster after {attempts} attempts: {source}")]
    ConnectAttempts {
        /// Attempts made
        attempts: usize,
        /// Error from the last attempt
        source: Box<NtripError>,
    },
    /// I/O error on an established connection
    #[error("NTRIP I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The caster closed the connection before answering
    #[error("caster closed the connection before responding")]
    EmptyResponse,
    /// The response did not start with a status line
    #[error("malformed caster response: {0:?}")]
    MalformedResponse(String),
    /// The caster answered with a non-200 status
    #[error("caster responded {code} {reason}")]
    Status {
        /// Status code
        code: u16,
        /// Reason phrase
        reason: String,
    },
    /// The mountpoint is not offered by the caster
    #[error("can not find mountpoint {0} in sourcetable")]
    MountpointNotFound(String),
    /// No client exists, connect first
    #[error("not connected to an NTRIP caster")]
    NotConnected,
    /// Cancelled while retrying
    #[error("NTRIP request cancelled")]
    Cancelled,
}

pub(crate) fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

#[derive(Error, Debug)]
/// Errors obtaining a GGA sentence from the receiver
pub enum GgaError {
    /// No GGA sentence within the scan buffer
    #[error("GGA message not found in the received data")]
    NotFound,
    /// Reading the receiver failed
    #[error("failed to read receiver output: {0}")]
    Read(#[from] crate::transport::TransportError),
}
