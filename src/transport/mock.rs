//! Mock transport for testing

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{ReceiverHandle, ReceiverTransport, TransportError};

/// Mock receiver recording every write
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    writes: Vec<Vec<u8>>,
    fail_on: Vec<Vec<u8>>,
    fail_open: bool,
    opened: usize,
    released: usize,
    transport_closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject receiver output
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().unwrap().read_buffer.extend(data);
    }

    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().unwrap().write_buffer.clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// Reject writes whose bytes contain `pattern`
    pub fn fail_writes_containing(&self, pattern: &[u8]) {
        self.inner.lock().unwrap().fail_on.push(pattern.to_vec());
    }

    pub fn fail_open(&self) {
        self.inner.lock().unwrap().fail_open = true;
    }

    /// Handles currently open
    pub fn open_handles(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.opened - inner.released
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().transport_closed
    }
}

impl ReceiverTransport for MockTransport {
    fn open_handle(&mut self) -> Result<Box<dyn ReceiverHandle>, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_open {
            return Err(TransportError::I2c("mock open failure".into()));
        }
        inner.opened += 1;
        Ok(Box::new(MockHandle {
            inner: self.inner.clone(),
            released: false,
        }))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.inner.lock().unwrap().transport_closed = true;
        Ok(())
    }
}

struct MockHandle {
    inner: Arc<Mutex<MockTransportInner>>,
    released: bool,
}

impl MockHandle {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.lock().unwrap().released += 1;
        }
    }
}

impl ReceiverHandle for MockHandle {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        let rejected = inner
            .fail_on
            .iter()
            .any(|p| data.windows(p.len()).any(|w| w == p.as_slice()));
        if rejected {
            return Err(TransportError::I2c("mock write failure".into()));
        }
        inner.write_buffer.extend_from_slice(data);
        inner.writes.push(data.to_vec());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        let available = inner.read_buffer.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *slot = byte;
        }
        Ok(available)
    }

    fn close(mut self: Box<Self>) -> Result<(), TransportError> {
        self.release();
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.release();
    }
}
