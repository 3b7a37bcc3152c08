use super::{ReceiverHandle, ReceiverTransport, TransportError};
use crate::pmtk;

/// An I2C bus provided by the board driver
pub trait I2cBus: Send {
    /// Open a handle to the device at `addr`
    fn open_handle(&mut self, addr: u8) -> Result<Box<dyn ReceiverHandle>, TransportError>;
}

/// Receiver attached to an I2C bus, configured with PMTK commands
pub struct I2cTransport<B> {
    bus: B,
    addr: u8,
    baud_rate: u32,
}

impl<B: I2cBus> I2cTransport<B> {
    /// Receiver at `addr` on `bus`, asked to run at `baud_rate`
    pub fn new(bus: B, addr: u8, baud_rate: u32) -> Self {
        Self {
            bus,
            addr,
            baud_rate,
        }
    }
}

impl<B: I2cBus> ReceiverTransport for I2cTransport<B> {
    fn open_handle(&mut self) -> Result<Box<dyn ReceiverHandle>, TransportError> {
        self.bus.open_handle(self.addr).map_err(|e| {
            log::error!("can't open gps i2c handle at {:#04x}: {e}", self.addr);
            e
        })
    }

    fn configure(&mut self, handle: &mut dyn ReceiverHandle) -> Result<(), TransportError> {
        // the receiver may already run at the requested rate
        if let Err(e) = handle.write(&pmtk::baud_rate(self.baud_rate)) {
            log::debug!("Failed to set baud rate: {e}");
        }
        handle
            .write(&pmtk::add_checksum(pmtk::SENTENCE_MASK.as_bytes()))
            .map_err(|e| {
                log::debug!("failed to set NMEA output: {e}");
                e
            })?;
        handle
            .write(&pmtk::add_checksum(pmtk::UPDATE_RATE.as_bytes()))
            .map_err(|e| {
                log::debug!("failed to set NMEA update rate: {e}");
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    struct MockBus(MockTransport);

    impl I2cBus for MockBus {
        fn open_handle(&mut self, addr: u8) -> Result<Box<dyn ReceiverHandle>, TransportError> {
            assert_eq!(addr, 0x42);
            self.0.open_handle()
        }
    }

    fn configure(mock: &MockTransport) -> Result<(), TransportError> {
        let mut transport = I2cTransport::new(MockBus(mock.clone()), 0x42, 38400);
        let mut handle = transport.open_handle()?;
        transport.configure(handle.as_mut())
    }

    #[test]
    fn sends_pmtk_setup() {
        let mock = MockTransport::new();
        configure(&mock).unwrap();
        let written = String::from_utf8(mock.get_written()).unwrap();
        assert!(written.starts_with("$PMTK251,38400*"));
        assert!(written.contains("$PMTK314,1,1,1,1,1,0"));
        assert!(written.ends_with("$PMTK220,1000*1F\r\n"));
    }

    #[test]
    fn baud_failure_is_tolerated() {
        let mock = MockTransport::new();
        mock.fail_writes_containing(b"PMTK251");
        configure(&mock).unwrap();
        let written = String::from_utf8(mock.get_written()).unwrap();
        assert!(!written.contains("PMTK251"));
        assert!(written.contains("PMTK220"));
    }

    #[test]
    fn sentence_mask_failure_is_fatal() {
        let mock = MockTransport::new();
        mock.fail_writes_containing(b"PMTK314");
        assert!(configure(&mock).is_err());
        let written = String::from_utf8(mock.get_written()).unwrap();
        assert!(!written.contains("PMTK220"));
    }

    #[test]
    fn update_rate_failure_is_fatal() {
        let mock = MockTransport::new();
        mock.fail_writes_containing(b"PMTK220");
        assert!(configure(&mock).is_err());
        let written = String::from_utf8(mock.get_written()).unwrap();
        assert!(written.contains("PMTK314"));
        assert!(!written.contains("PMTK220"));
    }
}
