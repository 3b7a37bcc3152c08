use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::cancel::CancelToken;
use crate::config::NtripConfig;
use crate::fault::LastError;
use crate::ntrip::NtripConnection;
use crate::position::{GeoPoint, LastPosition};
use crate::relay::CorrectionRelay;
use crate::sensor::{AngularVelocity, MovementSensor, Orientation, Properties, Vector3};
use crate::transport::ReceiverTransport;
use crate::{Error, Result};

/// A movement sensor whose receiver is fed NTRIP corrections.
///
/// Reads are delegated to the wrapped sensor. Once the correction relay
/// latches a fault every read fails with it, except
/// [`RtkMovementSensor::position`] which falls back to the last good fix.
pub struct RtkMovementSensor<S> {
    sensor: S,
    cancel: CancelToken,
    connection: Arc<NtripConnection>,
    last_error: Arc<LastError>,
    last_position: LastPosition,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: MovementSensor> RtkMovementSensor<S> {
    /// Wrap `sensor`, nothing is started
    pub fn new(config: &NtripConfig, sensor: S) -> Self {
        Self {
            sensor,
            cancel: CancelToken::new(),
            connection: Arc::new(NtripConnection::new(config.clone())),
            last_error: Arc::new(LastError::new()),
            last_position: LastPosition::new(),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Create and start in one step
    pub fn spawn<T: ReceiverTransport + 'static>(
        config: &NtripConfig,
        sensor: S,
        transport: T,
    ) -> Result<Self> {
        let rtk = Self::new(config, sensor);
        rtk.start(transport)?;
        Ok(rtk)
    }

    /// Start the sensor and the correction relay over `transport`. Only once.
    pub fn start<T: ReceiverTransport + 'static>(&self, transport: T) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }
        if let Err(e) = self.sensor.start(self.cancel.clone()) {
            self.started.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        let relay = CorrectionRelay::new(
            self.connection.clone(),
            transport,
            self.cancel.clone(),
            self.last_error.clone(),
        );
        let worker = relay.spawn()?;
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(worker);
        Ok(())
    }

    fn latched(&self) -> Result<()> {
        match self.last_error.get() {
            Some(err) => Err(Error::Latched(err)),
            None => Ok(()),
        }
    }

    /// Position and altitude.
    ///
    /// A zero or NaN fix is replaced by the last good one, keeping the
    /// reported altitude.
    pub fn position(&self) -> Result<(GeoPoint, f64)> {
        if let Some(err) = self.last_error.get() {
            return match self.last_position.get() {
                Some(point) => Ok((point, 0.0)),
                None => Err(Error::Latched(err)),
            };
        }
        let (point, alt) = self.sensor.position()?;
        if LastPosition::is_zero_position(&point) || LastPosition::is_position_nan(&point) {
            return Ok((self.last_position.get().unwrap_or(point), alt));
        }
        self.last_position.set(point);
        Ok((point, alt))
    }

    /// Linear velocity
    pub fn linear_velocity(&self) -> Result<Vector3> {
        self.latched()?;
        Ok(self.sensor.linear_velocity()?)
    }

    /// Linear acceleration
    pub fn linear_acceleration(&self) -> Result<Vector3> {
        self.latched()?;
        Ok(self.sensor.linear_acceleration()?)
    }

    /// Angular velocity
    pub fn angular_velocity(&self) -> Result<AngularVelocity> {
        self.latched()?;
        Ok(self.sensor.angular_velocity()?)
    }

    /// Orientation
    pub fn orientation(&self) -> Result<Orientation> {
        self.latched()?;
        Ok(self.sensor.orientation()?)
    }

    /// Compass heading
    pub fn compass_heading(&self) -> Result<f64> {
        self.latched()?;
        Ok(self.sensor.compass_heading()?)
    }

    /// Supported quantities
    pub fn properties(&self) -> Result<Properties> {
        self.latched()?;
        Ok(self.sensor.properties()?)
    }

    /// Accuracy estimates
    pub fn accuracy(&self) -> Result<HashMap<String, f32>> {
        self.latched()?;
        Ok(self.sensor.accuracy()?)
    }

    /// Fix quality
    pub fn read_fix(&self) -> Result<i32> {
        self.latched()?;
        Ok(self.sensor.read_fix()?)
    }

    /// Satellites in view
    pub fn read_satellites_in_view(&self) -> Result<i32> {
        self.latched()?;
        Ok(self.sensor.read_satellites_in_view()?)
    }

    /// The fault latched by the relay, if any
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.last_error.get()
    }

    /// The shared NTRIP session
    pub fn connection(&self) -> &NtripConnection {
        &self.connection
    }

    /// Stop the relay and the sensor.
    ///
    /// Blocks until the relay thread has exited. A latched cancellation is
    /// not an error.
    pub fn close(&self) -> Result<()> {
        self.cancel.cancel();
        let closed = self.sensor.close();
        self.connection.close();
        self.join_relay();
        closed?;
        match self.last_error.get() {
            Some(err) if !err.is_cancelled() => Err(Error::Latched(err)),
            _ => Ok(()),
        }
    }
}

impl<S> RtkMovementSensor<S> {
    fn join_relay(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::error!("correction relay thread panicked");
            }
        }
    }
}

impl<S> Drop for RtkMovementSensor<S> {
    /// Stops the relay thread if [`RtkMovementSensor::close`] was never called
    fn drop(&mut self) {
        self.cancel.cancel();
        self.connection.close();
        self.join_relay();
    }
}
