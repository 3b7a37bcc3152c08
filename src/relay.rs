use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::config::NtripConfig;
use crate::fault::LastError;
use crate::ntrip::{find_gga, is_timeout, NtripConnection, NtripError, VirtualBaseSession};
use crate::rtcm::RtcmScanner;
use crate::transport::ReceiverTransport;
use crate::{Error, Result};

/// How long the receiver may stay silent while looking for a GGA sentence
const GGA_WAIT: Duration = Duration::from_secs(2);
/// Consecutive read timeouts after which a silent stream is reopened
const MAX_SILENT_READS: u32 = 10;

/// Where correction bytes come from
enum CorrectionSource {
    Caster(Box<dyn Read + Send>),
    VirtualBase(VirtualBaseSession),
}

impl Read for CorrectionSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CorrectionSource::Caster(r) => r.read(buf),
            CorrectionSource::VirtualBase(r) => r.read(buf),
        }
    }
}

/// Background loop relaying caster corrections into the receiver.
///
/// Fatal errors are latched into the shared [`LastError`]. Every error seen
/// after the token was cancelled is latched as [`Error::Cancelled`].
pub struct CorrectionRelay<T> {
    connection: Arc<NtripConnection>,
    transport: T,
    cancel: CancelToken,
    last_error: Arc<LastError>,
}

impl<T: ReceiverTransport + 'static> CorrectionRelay<T> {
    /// Relay over `transport`, not started
    pub fn new(
        connection: Arc<NtripConnection>,
        transport: T,
        cancel: CancelToken,
        last_error: Arc<LastError>,
    ) -> Self {
        Self {
            connection,
            transport,
            cancel,
            last_error,
        }
    }

    /// Run the relay on its own thread
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("ntrip-relay".into())
            .spawn(move || self.run())
            .map_err(Error::Thread)
    }

    /// Run the relay on the current thread until cancelled or failed
    pub fn run(mut self) {
        let res = self.relay();
        if let Err(e) = self.transport.close() {
            log::warn!("closing receiver transport: {e}");
        }
        if let Err(e) = res {
            if self.cancel.is_cancelled() {
                log::debug!("correction relay cancelled ({e})");
                self.last_error.set(Error::Cancelled);
            } else {
                log::error!("correction relay stopped: {e}");
                self.last_error.set(e);
            }
        }
    }

    fn relay(&mut self) -> Result<()> {
        let config = self.connection.config().clone();
        self.connection.connect(
            &config.url,
            &config.username,
            &config.password,
            config.max_attempts(),
        )?;
        let virtual_base = self.probe_caster(&config);
        self.configure_receiver()?;

        let mut scanner = RtcmScanner::new(self.open_source(&config, virtual_base)?);
        let mut last_gga = Instant::now();
        let mut silent_reads = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if virtual_base && last_gga.elapsed() >= config.gga_interval() {
                last_gga = Instant::now();
                let sent = match scanner.get_mut() {
                    CorrectionSource::VirtualBase(session) => self.send_gga(session),
                    CorrectionSource::Caster(_) => Ok(()),
                };
                if let Err(e) = sent {
                    log::warn!("Failed to send GGA to virtual base: {e}");
                    scanner = self.reopen(&config, virtual_base)?;
                    continue;
                }
            }
            match scanner.next_message() {
                Ok(Some(frame)) => {
                    silent_reads = 0;
                    self.forward(&frame)?;
                }
                Ok(None) => {
                    log::debug!("No message... reconnecting to stream...");
                    scanner = self.reopen(&config, virtual_base)?;
                    last_gga = Instant::now();
                    silent_reads = 0;
                }
                Err(e) if is_timeout(&e) => {
                    silent_reads += 1;
                    if silent_reads >= MAX_SILENT_READS {
                        log::warn!("No corrections after {silent_reads} reads, reconnecting to stream");
                        scanner = self.reopen(&config, virtual_base)?;
                        last_gga = Instant::now();
                        silent_reads = 0;
                    }
                }
                Err(e) => return Err(NtripError::Io(e).into()),
            }
        }
    }

    /// Check the caster is up and decide whether the mountpoint wants GGA
    fn probe_caster(&self, config: &NtripConfig) -> bool {
        let Some(client) = self.connection.client() else {
            return config.virtual_base.unwrap_or(false);
        };
        let nmea = match client.sourcetable() {
            Ok(table) => match table.requires_nmea(&config.mountpoint) {
                Ok(nmea) => nmea,
                Err(e) => {
                    log::warn!("{e}");
                    false
                }
            },
            Err(e) => {
                log::warn!("caster {} seems to be down: {e}", config.url);
                false
            }
        };
        let virtual_base = config.virtual_base.unwrap_or(nmea);
        log::info!(
            "mountpoint {} uses {}",
            config.mountpoint,
            if virtual_base { "a virtual base station" } else { "a fixed base station" }
        );
        virtual_base
    }

    fn configure_receiver(&mut self) -> Result<()> {
        let mut handle = self.transport.open_handle()?;
        let configured = self.transport.configure(handle.as_mut());
        let closed = handle.close();
        configured?;
        closed?;
        Ok(())
    }

    fn open_source(&mut self, config: &NtripConfig, virtual_base: bool) -> Result<CorrectionSource> {
        if !virtual_base {
            let body =
                self.connection
                    .get_stream(&config.mountpoint, config.max_attempts(), &self.cancel)?;
            return Ok(CorrectionSource::Caster(body));
        }
        let attempts = config.max_attempts();
        let mut last = Error::Ntrip(NtripError::NotConnected);
        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.open_virtual_base(config) {
                Ok(session) => return Ok(CorrectionSource::VirtualBase(session)),
                Err(e) => {
                    log::debug!("Failed to open virtual base stream (attempt {attempt}/{attempts}): {e}");
                    last = e;
                }
            }
        }
        log::error!("Failed to open virtual base stream after {attempts} attempts: {last}");
        Err(last)
    }

    fn open_virtual_base(&mut self, config: &NtripConfig) -> Result<VirtualBaseSession> {
        let mut session = VirtualBaseSession::new(config)?;
        session.connect()?;
        if let Some(closer) = session.closer() {
            self.connection.attach(closer)?;
        }
        session.await_handshake()?;
        self.send_gga(&mut session)?;
        log::info!("Connected to virtual base stream {}", config.mountpoint);
        Ok(session)
    }

    fn reopen(
        &mut self,
        config: &NtripConfig,
        virtual_base: bool,
    ) -> Result<RtcmScanner<CorrectionSource>> {
        self.connection.close_stream();
        Ok(RtcmScanner::new(self.open_source(config, virtual_base)?))
    }

    fn send_gga(&mut self, session: &mut VirtualBaseSession) -> Result<()> {
        let mut handle = self.transport.open_handle()?;
        let gga = find_gga(handle.as_mut(), GGA_WAIT);
        let closed = handle.close();
        let gga = gga?;
        closed?;
        session.send_gga(&gga)?;
        Ok(())
    }

    /// The handle is released before the next network read
    fn forward(&mut self, frame: &[u8]) -> Result<()> {
        let mut handle = self.transport.open_handle()?;
        let written = handle.write(frame);
        let closed = handle.close();
        written?;
        closed?;
        Ok(())
    }
}
