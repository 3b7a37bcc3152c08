use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use super::http::{basic_auth, read_line, request, Headers, Protocol, ResponseBody, StatusLine};
use super::{NtripError, Sourcetable};

const DEFAULT_PORT: u16 = 80;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
/// An NTRIP caster client.
///
/// Construction only validates the address; every request dials a new
/// connection.
pub struct NtripClient {
    host: String,
    port: u16,
    authorization: Option<String>,
    read_timeout: Duration,
}

impl NtripClient {
    /// Client for `address`, which must be an `http://host[:port]` URL
    pub fn new(
        address: &str,
        username: &str,
        password: &str,
        read_timeout: Duration,
    ) -> Result<Self, NtripError> {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^http://(?P<host>[^:/\s]+)(?::(?P<port>\d{1,5}))?(?:/\S*)?$")
                    .expect("Failed to compile regex");
        }
        let invalid = || NtripError::InvalidAddress(address.to_string());
        let caps = RE.captures(address.trim()).ok_or_else(invalid)?;
        let port = match caps.name("port") {
            Some(port) => port.as_str().parse().map_err(|_| invalid())?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            host: caps["host"].to_string(),
            port,
            authorization: basic_auth(username, password),
            read_timeout,
        })
    }

    /// `host:port` of the caster
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open a TCP connection to the caster with read and write timeouts set
    pub(crate) fn dial(&self) -> Result<TcpStream, NtripError> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| NtripError::Resolve {
                host: self.host.clone(),
                source,
            })?;
        let mut last = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(socket) => {
                    socket.set_read_timeout(Some(self.read_timeout))?;
                    socket.set_write_timeout(Some(self.read_timeout))?;
                    return Ok(socket);
                }
                Err(e) => last = Some(e),
            }
        }
        Err(match last {
            Some(source) => NtripError::Connect {
                addr: self.host_port(),
                source,
            },
            None => NtripError::Resolve {
                host: self.host.clone(),
                source: io::Error::new(ErrorKind::NotFound, "no addresses"),
            },
        })
    }

    pub(crate) fn request(&self, path: &str) -> String {
        request(path, &self.host_port(), self.authorization.as_deref())
    }

    fn send(&self, path: &str) -> Result<(StatusLine, BufReader<TcpStream>, TcpStream), NtripError> {
        let mut socket = self.dial()?;
        socket.write_all(self.request(path).as_bytes())?;
        socket.flush()?;
        let mut reader = BufReader::new(socket.try_clone()?);
        let line = read_line(&mut reader)?.ok_or(NtripError::EmptyResponse)?;
        let status =
            StatusLine::parse(&line).ok_or_else(|| NtripError::MalformedResponse(line.clone()))?;
        log::debug!("GET {path} from {}: {status}", self.host_port());
        Ok((status, reader, socket))
    }

    /// Request the correction stream of `mountpoint`
    pub fn get_stream(&self, mountpoint: &str) -> Result<CorrectionStream, NtripError> {
        let path = format!("/{}", mountpoint.trim_start_matches('/'));
        let (status, mut reader, socket) = self.send(&path)?;
        if !status.is_ok() {
            return Err(NtripError::Status {
                code: status.code,
                reason: status.reason,
            });
        }
        let body = match status.protocol {
            // NTRIP 1.0: data follows the status line directly
            Protocol::Icy => ResponseBody::new(reader, false),
            Protocol::Http => {
                let headers = Headers::read(&mut reader)?;
                if headers
                    .get("content-type")
                    .is_some_and(|t| t.contains("sourcetable"))
                {
                    return Err(NtripError::MountpointNotFound(mountpoint.to_string()));
                }
                ResponseBody::new(reader, headers.is_chunked())
            }
            Protocol::Sourcetable => {
                return Err(NtripError::MountpointNotFound(mountpoint.to_string()))
            }
        };
        Ok(CorrectionStream {
            body,
            socket,
            legacy: status.protocol == Protocol::Icy,
            status: status.to_string(),
        })
    }

    /// Fetch and parse the caster sourcetable
    pub fn sourcetable(&self) -> Result<Sourcetable, NtripError> {
        let (status, mut reader, _socket) = self.send("/")?;
        if !status.is_ok() {
            return Err(NtripError::Status {
                code: status.code,
                reason: status.reason,
            });
        }
        let headers = Headers::read(&mut reader)?;
        let body = ResponseBody::new(reader, headers.is_chunked());
        Ok(Sourcetable::read(&mut BufReader::new(body))?)
    }

    /// True if the caster answers a sourcetable request
    pub fn is_caster_alive(&self) -> bool {
        match self.sourcetable() {
            Ok(_) => true,
            Err(e) => {
                log::debug!("sourcetable request to {} failed: {e}", self.host_port());
                false
            }
        }
    }
}

/// An open correction stream
pub struct CorrectionStream {
    body: ResponseBody<BufReader<TcpStream>>,
    socket: TcpStream,
    legacy: bool,
    status: String,
}

impl CorrectionStream {
    /// True if the caster used the NTRIP 1.0 `ICY 200 OK` reply
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// The status line the caster answered with
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Separate the closable socket from the readable body
    pub fn split(self) -> (StreamCloser, Box<dyn Read + Send>) {
        (StreamCloser::new(self.socket), Box::new(self.body))
    }
}

impl Read for CorrectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

#[derive(Debug)]
/// Shuts a stream socket down from another thread, unblocking its reader
pub struct StreamCloser {
    socket: TcpStream,
}

impl StreamCloser {
    pub(crate) fn new(socket: TcpStream) -> Self {
        Self { socket }
    }

    /// Shut the socket down in both directions
    pub fn close(&self) -> io::Result<()> {
        match self.socket.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            res => res,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Accept one connection, answer `response`, return the request head
    pub(crate) fn serve_once(response: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let hdl = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(socket.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            let mut socket = socket;
            socket.write_all(&response).unwrap();
            head
        });
        (addr, hdl)
    }

    fn client(addr: &str) -> NtripClient {
        NtripClient::new(addr, "user", "pwd", Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn address_validation() {
        let err = NtripClient::new("invalidurl", "", "", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("address must start with http://"));
        assert!(NtripClient::new("https://caster:2101", "", "", Duration::from_secs(1)).is_err());

        let c = NtripClient::new("http://caster.example:2101/", "", "", Duration::from_secs(1))
            .unwrap();
        assert_eq!(c.host_port(), "caster.example:2101");
        let c = NtripClient::new("http://fakeurl", "", "", Duration::from_secs(1)).unwrap();
        assert_eq!(c.host_port(), "fakeurl:80");
    }

    #[test]
    fn unresolvable_host() {
        let c = client("http://fakeurl.invalid");
        match c.get_stream("NYC") {
            Err(e @ NtripError::Resolve { .. }) => assert!(e.to_string().contains("resolve")),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("stream from an unresolvable host"),
        }
    }

    #[test]
    fn legacy_stream() {
        let (addr, hdl) = serve_once(b"ICY 200 OK\r\n\xD3\x00\x00".to_vec());
        let mut stream = client(&addr).get_stream("NYC").unwrap();
        assert!(stream.is_legacy());
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(data, [0xD3, 0, 0]);

        let head = hdl.join().unwrap();
        assert!(head.starts_with("GET /NYC HTTP/1.1\r\n"));
        assert!(head.contains("Authorization: Basic dXNlcjpwd2Q=\r\n"));
    }

    #[test]
    fn chunked_stream() {
        let (addr, hdl) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: gnss/data\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n"
                .to_vec(),
        );
        let stream = client(&addr).get_stream("/NYC").unwrap();
        assert!(!stream.is_legacy());
        assert_eq!(stream.status(), "HTTP/1.1 200 OK");
        let (closer, mut body) = stream.split();
        let mut data = String::new();
        body.read_to_string(&mut data).unwrap();
        assert_eq!(data, "abcde");
        closer.close().unwrap();
        hdl.join().unwrap();
    }

    #[test]
    fn rejected_stream() {
        let (addr, hdl) = serve_once(b"HTTP/1.1 401 Unauthorized\r\n\r\n".to_vec());
        match client(&addr).get_stream("NYC") {
            Err(NtripError::Status { code, .. }) => assert_eq!(code, 401),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("stream despite 401"),
        }
        hdl.join().unwrap();
    }

    #[test]
    fn unknown_mountpoint_gets_sourcetable() {
        let (addr, hdl) = serve_once(b"SOURCETABLE 200 OK\r\n\r\nENDSOURCETABLE\r\n".to_vec());
        assert!(matches!(
            client(&addr).get_stream("NOPE"),
            Err(NtripError::MountpointNotFound(m)) if m == "NOPE"
        ));
        hdl.join().unwrap();
    }

    #[test]
    fn fetch_sourcetable() {
        let (addr, hdl) = serve_once(
            b"SOURCETABLE 200 OK\r\nServer: test\r\nContent-Type: text/plain\r\n\r\n\
STR;VRS01;Network;RTCM 3.1;1004(1);2;GPS;NET;USA;40.00;-74.00;1;1;VRS;none;B;N;9600;\r\n\
ENDSOURCETABLE\r\n"
                .to_vec(),
        );
        let table = client(&addr).sourcetable().unwrap();
        assert!(table.requires_nmea("VRS01").unwrap());
        assert!(hdl.join().unwrap().starts_with("GET / HTTP/1.1"));
    }

    #[test]
    fn caster_liveness() {
        let (addr, hdl) = serve_once(b"SOURCETABLE 200 OK\r\n\r\nENDSOURCETABLE\r\n".to_vec());
        assert!(client(&addr).is_caster_alive());
        hdl.join().unwrap();
        assert!(!client("http://fakeurl.invalid").is_caster_alive());
    }
}
