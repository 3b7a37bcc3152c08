//! Write side of the GNSS receiver.

use thiserror::Error;

mod i2c;
#[cfg(test)]
pub(crate) mod mock;
mod serial;

pub use i2c::{I2cBus, I2cTransport};
pub use serial::SerialTransport;

#[derive(Error, Debug)]
/// Receiver transport errors
pub enum TransportError {
    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// I2C bus error
    #[error("i2c error: {0}")]
    I2c(String),
    /// Transport has been closed
    #[error("transport closed")]
    Closed,
}

/// An open handle to the receiver, released by [`ReceiverHandle::close`] or drop.
pub trait ReceiverHandle: Send {
    /// Write all of `data` to the receiver
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read receiver output, zero when nothing arrived before the timeout
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Release the handle
    fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// A way of reaching the receiver.
///
/// Handles are acquired per write batch, since the bus may be shared.
pub trait ReceiverTransport: Send {
    /// Acquire a fresh handle
    fn open_handle(&mut self) -> Result<Box<dyn ReceiverHandle>, TransportError>;

    /// Send transport specific setup commands
    fn configure(&mut self, _handle: &mut dyn ReceiverHandle) -> Result<(), TransportError> {
        Ok(())
    }

    /// Release anything held between handles
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
