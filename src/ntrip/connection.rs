use std::io::Read;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{NtripClient, NtripError, StreamCloser};
use crate::cancel::CancelToken;
use crate::config::NtripConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether a correction stream is attached to the session
pub enum StreamStatus {
    /// No stream
    Idle,
    /// A stream is open and its closer is stored
    Streaming,
}

struct NtripSession {
    client: Option<NtripClient>,
    stream: Option<StreamCloser>,
    status: StreamStatus,
}

impl NtripSession {
    fn shutdown_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.close() {
                log::debug!("closing NTRIP stream: {e}");
            }
        }
        self.status = StreamStatus::Idle;
    }
}

/// The NTRIP session shared by the relay thread and the sensor.
///
/// The session lock is only held to swap handles, never during network I/O.
pub struct NtripConnection {
    config: NtripConfig,
    session: Mutex<NtripSession>,
}

impl NtripConnection {
    /// Idle connection for `config`, nothing is dialed yet
    pub fn new(config: NtripConfig) -> Self {
        Self {
            config,
            session: Mutex::new(NtripSession {
                client: None,
                stream: None,
                status: StreamStatus::Idle,
            }),
        }
    }

    /// The caster settings
    pub fn config(&self) -> &NtripConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, NtripSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the caster client, trying up to `max_attempts` times
    pub fn connect(
        &self,
        address: &str,
        username: &str,
        password: &str,
        max_attempts: usize,
    ) -> Result<(), NtripError> {
        let mut last = NtripError::NotConnected;
        let max_attempts = max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match NtripClient::new(address, username, password, self.config.read_timeout()) {
                Ok(client) => {
                    log::info!("Connected to NTRIP caster {address}");
                    self.session().client = Some(client);
                    return Ok(());
                }
                Err(e) => {
                    log::debug!("NTRIP connect attempt {attempt}/{max_attempts}: {e}");
                    last = e;
                }
            }
        }
        Err(NtripError::ConnectAttempts {
            attempts: max_attempts,
            source: Box::new(last),
        })
    }

    /// Open the correction stream of `mountpoint`.
    ///
    /// The closable side stays in the session so [`NtripConnection::close`]
    /// can unblock a reader of the returned body.
    pub fn get_stream(
        &self,
        mountpoint: &str,
        max_attempts: usize,
        cancel: &CancelToken,
    ) -> Result<Box<dyn Read + Send>, NtripError> {
        let mut last = NtripError::NotConnected;
        let max_attempts = max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(NtripError::Cancelled);
            }
            let client = self.client().ok_or(NtripError::NotConnected)?;
            match client.get_stream(mountpoint) {
                Ok(stream) => {
                    if stream.is_legacy() {
                        log::warn!("Detected old HTTP protocol: {}", stream.status());
                    }
                    let (closer, body) = stream.split();
                    self.attach(closer)?;
                    log::info!("Connected to stream {mountpoint}");
                    return Ok(body);
                }
                Err(e) => {
                    log::debug!("Failed to get NTRIP stream (attempt {attempt}/{max_attempts}): {e}");
                    last = e;
                }
            }
        }
        log::error!("Failed to get NTRIP stream after {max_attempts} attempts: {last}");
        Err(last)
    }

    /// Store the closer of a stream opened elsewhere.
    ///
    /// Fails, shutting the stream down, if the client was closed meanwhile.
    pub fn attach(&self, closer: StreamCloser) -> Result<(), NtripError> {
        let mut session = self.session();
        if session.client.is_none() {
            let _ = closer.close();
            return Err(NtripError::NotConnected);
        }
        session.shutdown_stream();
        session.stream = Some(closer);
        session.status = StreamStatus::Streaming;
        Ok(())
    }

    /// Shut the current stream down, keeping the client
    pub fn close_stream(&self) {
        self.session().shutdown_stream();
    }

    /// Drop the client and shut the stream down. Idempotent.
    pub fn close(&self) {
        let mut session = self.session();
        session.client = None;
        session.shutdown_stream();
    }

    /// Current stream status
    pub fn status(&self) -> StreamStatus {
        self.session().status
    }

    /// True once connected and until closed
    pub fn has_client(&self) -> bool {
        self.session().client.is_some()
    }

    /// A copy of the caster client
    pub fn client(&self) -> Option<NtripClient> {
        self.session().client.clone()
    }
}
