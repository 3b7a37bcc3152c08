use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::bytes::Regex;

use super::http::{read_line, Headers, ResponseBody, StatusLine};
use super::{is_timeout, GgaError, NtripClient, NtripError, StreamCloser};
use crate::config::NtripConfig;
use crate::transport::ReceiverHandle;

/// Receiver output scanned for a GGA sentence
pub const GGA_BUFFER_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Handshake progress of a [`VirtualBaseSession`]
pub enum VrsState {
    /// No socket
    Disconnected,
    /// Request sent, status line not seen yet
    AwaitingHandshake,
    /// `200 OK` received, corrections flow
    Connected,
}

/// Session with a virtual reference station mountpoint.
///
/// The caster computes corrections for the position we report, so the
/// session keeps a writer for GGA sentences next to the correction reader.
pub struct VirtualBaseSession {
    client: NtripClient,
    mountpoint: String,
    socket: Option<TcpStream>,
    reader: Option<BufReader<TcpStream>>,
    body: Option<ResponseBody<BufReader<TcpStream>>>,
    writer: Option<BufWriter<TcpStream>>,
    state: VrsState,
}

impl VirtualBaseSession {
    /// Session for the configured caster and mountpoint
    pub fn new(config: &NtripConfig) -> Result<Self, NtripError> {
        let address = config
            .url
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        let client = NtripClient::new(
            &format!("http://{address}"),
            &config.username,
            &config.password,
            config.read_timeout(),
        )?;
        Ok(Self {
            client,
            mountpoint: config.mountpoint.clone(),
            socket: None,
            reader: None,
            body: None,
            writer: None,
            state: VrsState::Disconnected,
        })
    }

    /// Current handshake state
    pub fn state(&self) -> VrsState {
        self.state
    }

    /// True after a successful handshake
    pub fn is_connected(&self) -> bool {
        self.state == VrsState::Connected
    }

    /// Dial the caster and send the stream request
    pub fn connect(&mut self) -> Result<(), NtripError> {
        self.reset();
        match self.open() {
            Ok(()) => {
                self.state = VrsState::AwaitingHandshake;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    fn open(&mut self) -> Result<(), NtripError> {
        let socket = self.client.dial()?;
        let mut writer = BufWriter::new(socket.try_clone()?);
        let path = format!("/{}", self.mountpoint.trim_start_matches('/'));
        writer.write_all(self.client.request(&path).as_bytes())?;
        writer.flush()?;
        self.reader = Some(BufReader::new(socket.try_clone()?));
        self.writer = Some(writer);
        self.socket = Some(socket);
        Ok(())
    }

    /// Wait for the caster status line.
    ///
    /// Anything but `200 OK` tears the session down. So does end of stream,
    /// so the next [`VirtualBaseSession::connect`] dials again.
    pub fn await_handshake(&mut self) -> Result<(), NtripError> {
        if self.state != VrsState::AwaitingHandshake {
            return Err(NtripError::NotConnected);
        }
        let mut reader = self.reader.take().ok_or(NtripError::NotConnected)?;
        match Self::handshake(&mut reader) {
            Ok(chunked) => {
                log::info!("Virtual base handshake with {} complete", self.client.host_port());
                self.body = Some(ResponseBody::new(reader, chunked));
                self.state = VrsState::Connected;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Read up to the status line, returns whether the body is chunked
    fn handshake(reader: &mut BufReader<TcpStream>) -> Result<bool, NtripError> {
        loop {
            let line = read_line(reader)?.ok_or(NtripError::EmptyResponse)?;
            let http = line.starts_with("HTTP/");
            if !http && !line.starts_with("ICY") {
                log::debug!("skipping {line:?} before status line");
                continue;
            }
            if !line.contains("200 OK") {
                return Err(match StatusLine::parse(&line) {
                    Some(status) => NtripError::Status {
                        code: status.code,
                        reason: status.reason,
                    },
                    None => NtripError::MalformedResponse(line),
                });
            }
            return Ok(http && Headers::read(reader)?.is_chunked());
        }
    }

    /// Report our position to the caster
    pub fn send_gga(&mut self, sentence: &str) -> Result<(), NtripError> {
        if self.state != VrsState::Connected {
            return Err(NtripError::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(NtripError::NotConnected)?;
        let line = format!("{}\r\n", sentence.trim_end());
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            self.reset();
            return Err(e.into());
        }
        log::debug!("sent GGA to virtual base: {}", line.trim_end());
        Ok(())
    }

    /// Closer for the current socket, used to unblock a reader on shutdown
    pub fn closer(&self) -> Option<StreamCloser> {
        self.socket
            .as_ref()
            .and_then(|s| s.try_clone().ok())
            .map(StreamCloser::new)
    }

    /// Drop the socket and return to [`VrsState::Disconnected`]
    pub fn reset(&mut self) {
        self.reader = None;
        self.body = None;
        self.writer = None;
        if let Some(socket) = self.socket.take() {
            let _ = socket.shutdown(std::net::Shutdown::Both);
        }
        self.state = VrsState::Disconnected;
    }
}

impl Read for VirtualBaseSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let body = self.body.as_mut().ok_or_else(|| {
            io::Error::new(ErrorKind::NotConnected, "virtual base session not connected")
        })?;
        let res = body.read(buf);
        if matches!(&res, Err(e) if !is_timeout(e)) {
            self.reset();
        }
        res
    }
}

/// Pull a GGA sentence out of the receiver output.
///
/// Reads at most [`GGA_BUFFER_LEN`] bytes. Reads returning nothing are
/// retried for `wait`, after which the receiver counts as silent.
pub fn find_gga(handle: &mut dyn ReceiverHandle, wait: Duration) -> Result<String, GgaError> {
    lazy_static! {
        static ref GGA: Regex =
            Regex::new(r"\$[A-Z]{2}GGA[^\r\n]*").expect("Failed to compile regex");
    }
    let deadline = Instant::now() + wait;
    let mut buf = vec![0u8; GGA_BUFFER_LEN];
    let mut len = 0;
    while len < buf.len() {
        let n = handle.read(&mut buf[len..])?;
        if n == 0 {
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
            continue;
        }
        len += n;
        if let Some(m) = GGA.find(&buf[..len]) {
            if m.end() < len {
                return Ok(String::from_utf8_lossy(m.as_bytes()).into_owned());
            }
        }
    }
    // a sentence cut off by the end of the buffer is still usable
    GGA.find(&buf[..len])
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        .ok_or(GgaError::NotFound)
}
