use std::sync::{Arc, Mutex, PoisonError};

use crate::Error;

#[derive(Debug, Default)]
/// A sticky slot holding the latest fatal relay error.
///
/// Cleared only by recreating the sensor.
pub struct LastError {
    slot: Mutex<Option<Arc<Error>>>,
}

impl LastError {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch an error, replacing any previous one
    pub fn set(&self, err: Error) {
        log::debug!("latching relay error: {err}");
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(err));
    }

    /// The latched error, if any
    pub fn get(&self) -> Option<Arc<Error>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
