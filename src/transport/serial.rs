use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::{ReceiverHandle, ReceiverTransport, TransportError};

const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Receiver attached to a serial port.
///
/// The port is opened on first use and every handle is a cloned descriptor,
/// so no handle is kept open between writes.
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Describe a serial receiver, e.g. `/dev/ttyUSB0` at 115200 baud
    pub fn new(path: &str, baud_rate: u32) -> Self {
        Self {
            path: path.to_string(),
            baud_rate,
            port: None,
        }
    }

    fn port(&mut self) -> Result<&dyn SerialPort, TransportError> {
        if self.port.is_none() {
            let port = serialport::new(&self.path, self.baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(SERIAL_TIMEOUT)
                .open()?;
            log::info!("Opened serial port: {} at {} baud", self.path, self.baud_rate);
            self.port = Some(port);
        }
        self.port.as_deref().ok_or(TransportError::Closed)
    }
}

impl ReceiverTransport for SerialTransport {
    fn open_handle(&mut self) -> Result<Box<dyn ReceiverHandle>, TransportError> {
        let port = self.port()?.try_clone()?;
        Ok(Box::new(SerialHandle { port }))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            log::debug!("Closed serial port: {}", self.path);
        }
        Ok(())
    }
}

struct SerialHandle {
    port: Box<dyn SerialPort>,
}

impl ReceiverHandle for SerialHandle {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        Ok(())
    }
}
